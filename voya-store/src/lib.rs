pub mod app_config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use app_config::{ApprovalRules, Config};
pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx};
pub use store::{Store, StoreTx};
