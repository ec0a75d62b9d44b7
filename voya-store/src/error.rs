use thiserror::Error;

/// Infrastructure faults from the backing store.
///
/// Transient classes (deadlock, lock-wait, serialization) are the only ones
/// the orchestrator is allowed to retry; everything else surfaces as a hard
/// failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("deadlock detected")]
    Deadlock,

    #[error("lock wait timed out")]
    LockTimeout,

    #[error("serialization conflict")]
    Serialization,

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Deadlock | StoreError::LockTimeout | StoreError::Serialization
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // Postgres SQLSTATE classes for transient transaction conflicts.
            match db.code().as_deref() {
                Some("40P01") => return StoreError::Deadlock,
                Some("55P03") => return StoreError::LockTimeout,
                Some("40001") => return StoreError::Serialization,
                _ => {}
            }
        }
        StoreError::Database(err.to_string())
    }
}
