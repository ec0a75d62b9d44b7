use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use voya_store::StoreError;

/// Expected business failures of the approval pipeline, plus the wrapped
/// infrastructure fault. Capacity conflicts are terminal for the call but
/// intended to be retried at the business level; only transient store
/// errors are retried automatically.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("request {0} not found")]
    RequestNotFound(Uuid),

    #[error("request not approvable: {0}")]
    InvalidState(String),

    #[error("flight {0} not found")]
    FlightNotFound(Uuid),

    #[error("hotel {0} has no rooms configured")]
    HotelNotFound(Uuid),

    #[error("insufficient capacity for {requested} unit(s) on {dates:?}")]
    InsufficientCapacity {
        requested: i32,
        dates: Vec<NaiveDate>,
    },

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("insufficient rooms: requested {requested}, available {available}")]
    InsufficientRooms { requested: i32, available: i64 },

    #[error("a concurrent writer won the race on {date}")]
    OptimisticLockFailed { date: NaiveDate },

    #[error("seat reservation on flight {flight_id} lost the race")]
    SeatReservationFailed { flight_id: Uuid },

    #[error("allocation {0} not found")]
    AllocationNotFound(Uuid),

    #[error("allocation {0} is not active")]
    AllocationNotActive(Uuid),

    #[error("release failed: {0}")]
    ReleaseFailed(String),

    #[error("transient storage conflict persisted after {0} attempt(s)")]
    RetryExhausted(u32),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApprovalError {
    /// Stable machine-readable code exposed at the API boundary.
    pub fn code(&self) -> &'static str {
        match self {
            ApprovalError::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            ApprovalError::InvalidState(_) => "INVALID_STATE",
            ApprovalError::FlightNotFound(_) => "FLIGHT_NOT_FOUND",
            ApprovalError::HotelNotFound(_) => "HOTEL_NOT_FOUND",
            ApprovalError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            ApprovalError::InsufficientSeats { .. } => "INSUFFICIENT_CAPACITY",
            ApprovalError::InsufficientRooms { .. } => "INSUFFICIENT_ROOMS",
            ApprovalError::OptimisticLockFailed { .. } => "OPTIMISTIC_LOCK_FAILED",
            ApprovalError::SeatReservationFailed { .. } => "SEAT_RESERVATION_FAILED",
            ApprovalError::AllocationNotFound(_) => "RELEASE_ERROR",
            ApprovalError::AllocationNotActive(_) => "ALLOCATION_NOT_ACTIVE",
            ApprovalError::ReleaseFailed(_) => "RELEASE_ERROR",
            ApprovalError::RetryExhausted(_) => "DEADLOCK_RETRY",
            ApprovalError::Store(err) if err.is_transient() => "DEADLOCK_RETRY",
            ApprovalError::Store(_) => "DATABASE_ERROR",
            ApprovalError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    /// Only deadlock/lock-wait/serialization faults from the store qualify
    /// for the orchestrator's bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApprovalError::Store(err) if err.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_faults_split_by_transience() {
        let deadlock = ApprovalError::from(StoreError::Deadlock);
        assert!(deadlock.is_transient());
        assert_eq!(deadlock.code(), "DEADLOCK_RETRY");

        let hard = ApprovalError::from(StoreError::Database("connection lost".to_string()));
        assert!(!hard.is_transient());
        assert_eq!(hard.code(), "DATABASE_ERROR");
    }

    #[test]
    fn business_failures_are_never_transient() {
        let err = ApprovalError::InsufficientCapacity { requested: 3, dates: vec![] };
        assert!(!err.is_transient());
        assert_eq!(err.code(), "INSUFFICIENT_CAPACITY");
    }
}
