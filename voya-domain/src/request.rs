use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of inventory a request is asking for. Drives strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Hotel,
    Flight,
    Transport,
    Other,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Hotel => "hotel",
            ProviderType::Flight => "flight",
            ProviderType::Transport => "transport",
            ProviderType::Other => "other",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(ProviderType::Hotel),
            "flight" => Ok(ProviderType::Flight),
            "transport" => Ok(ProviderType::Transport),
            "other" => Ok(ProviderType::Other),
            other => Err(format!("unknown provider type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

/// Provider-specific detail carried by a request. Persisted as tagged JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetail {
    #[default]
    None,
    Flight {
        cabin_class: Option<crate::flight::CabinClass>,
    },
    Rooms {
        /// Must equal the request quantity; the ledger debit uses quantity.
        rooms_requested: i32,
        occupancy: i32,
    },
}

/// A pending ask for a unit of capacity awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub provider_type: ProviderType,
    pub item_id: Uuid,
    pub status: RequestStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub quantity: i32,
    pub currency: String,
    pub requested_by: String,
    pub detail: RequestDetail,
    pub expires_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approval_notes: Option<String>,
    pub approval_terms: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a request cannot be approved right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalBlock {
    #[error("request is not pending")]
    NotPending,
    #[error("request has expired")]
    RequestExpired,
    #[error("request start date is in the past")]
    StartDateInPast,
    #[error("request end date precedes start date")]
    InvalidDateRange,
    #[error("requested quantity must be positive")]
    NonPositiveQuantity,
}

impl ServiceRequest {
    /// Re-checked under the row lock at approval time; a late approval
    /// becomes a clean functional failure, never a partial allocation.
    pub fn approval_block(&self, now: DateTime<Utc>) -> Option<ApprovalBlock> {
        if self.status != RequestStatus::Pending {
            return Some(ApprovalBlock::NotPending);
        }
        if self.expires_at <= now {
            return Some(ApprovalBlock::RequestExpired);
        }
        if self.start_date < now.date_naive() {
            return Some(ApprovalBlock::StartDateInPast);
        }
        if self.end_date < self.start_date {
            return Some(ApprovalBlock::InvalidDateRange);
        }
        if self.quantity <= 0 {
            return Some(ApprovalBlock::NonPositiveQuantity);
        }
        None
    }

    /// The dates this request debits.
    ///
    /// Hotels book nights, so checkout day is excluded. Everything else is
    /// an inclusive range, with start == end meaning a single day.
    pub fn stay_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut cursor = self.start_date;
        let last_is_booked = self.provider_type != ProviderType::Hotel;
        while cursor < self.end_date || (last_is_booked && cursor == self.end_date) {
            dates.push(cursor);
            cursor = match cursor.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }
}
