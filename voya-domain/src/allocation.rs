use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flight::CabinClass;
use crate::request::ProviderType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Released,
}

/// One day's slice of a ledger-backed allocation. The release path walks
/// these entries to credit capacity back date by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAllocation {
    pub date: NaiveDate,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatAllocation {
    pub flight_id: Uuid,
    pub seats: i32,
    pub cabin_class: CabinClass,
    pub unit_price: f64,
}

/// What exactly was captured, per provider shape. Downstream booking
/// materialization consumes this as its contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationBreakdown {
    PerDay { days: Vec<DayAllocation> },
    Seats { seats: SeatAllocation },
}

impl AllocationBreakdown {
    pub fn total_price(&self) -> f64 {
        match self {
            AllocationBreakdown::PerDay { days } => days
                .iter()
                .map(|d| d.unit_price * f64::from(d.quantity))
                .sum(),
            AllocationBreakdown::Seats { seats } => {
                seats.unit_price * f64::from(seats.seats)
            }
        }
    }
}

/// Durable record of a successful reservation. Immutable once created;
/// the only transition is active -> released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_type: ProviderType,
    pub item_id: Uuid,
    pub status: AllocationStatus,
    pub allocated_price: f64,
    pub commission: f64,
    pub currency: String,
    pub breakdown: AllocationBreakdown,
    pub approved_by: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub released_by: Option<String>,
    pub release_reason: Option<String>,
}
