pub mod collaborators;
pub mod error;
pub mod ledger;
pub mod rooms;
pub mod seats;
pub mod service;
pub mod strategy;

pub use collaborators::{IdentityContext, NoDynamicPricing, PriceLookup, StaticIdentity, SystemIdentity};
pub use error::ApprovalError;
pub use ledger::LedgerStrategy;
pub use rooms::RoomCalendarStrategy;
pub use seats::SeatCounterStrategy;
pub use service::{ApprovalService, BatchOutcome, BatchResult, DaySnapshot};
pub use strategy::{
    ApprovalOptions, PricingOverride, ReleaseOptions, ReservationOutcome, ReservationStrategy,
    StrategyRegistry,
};
