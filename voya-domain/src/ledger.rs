use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::request::ProviderType;

/// Date-indexed inventory row with a version token for optimistic concurrency.
///
/// Invariant: available + allocated + blocked == total, always. Writers must
/// go through a version-checked compare-and-swap; a zero-row update means a
/// concurrent writer won the race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityRow {
    pub provider_type: ProviderType,
    pub item_id: Uuid,
    pub date: NaiveDate,
    pub total_capacity: i32,
    pub allocated_capacity: i32,
    pub blocked_capacity: i32,
    pub available_capacity: i32,
    pub version: i64,
    pub is_open: bool,
    pub base_price: f64,
    pub currency: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl CapacityRow {
    pub fn invariant_holds(&self) -> bool {
        self.available_capacity + self.allocated_capacity + self.blocked_capacity
            == self.total_capacity
            && self.available_capacity >= 0
            && self.allocated_capacity >= 0
            && self.blocked_capacity >= 0
    }

    /// Fresh row for a date that had no inventory yet.
    pub fn provisioned(
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        defaults: &ProvisionDefaults,
        currency: &str,
    ) -> Self {
        CapacityRow {
            provider_type,
            item_id,
            date,
            total_capacity: defaults.capacity,
            allocated_capacity: 0,
            blocked_capacity: 0,
            available_capacity: defaults.capacity,
            version: 1,
            is_open: true,
            base_price: defaults.price,
            currency: currency.to_string(),
            updated_at: Utc::now(),
        }
    }
}

/// Seed capacity and price used when a ledger row has to be auto-created.
///
/// Business policy, not a functional constant: real inventory feeds override
/// these per deployment through configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProvisionDefaults {
    pub capacity: i32,
    pub price: f64,
}

impl ProvisionDefaults {
    /// Stock defaults applied when configuration supplies nothing.
    pub fn standard_map() -> HashMap<ProviderType, ProvisionDefaults> {
        HashMap::from([
            (ProviderType::Hotel, ProvisionDefaults { capacity: 50, price: 100.0 }),
            (ProviderType::Flight, ProvisionDefaults { capacity: 150, price: 300.0 }),
            (ProviderType::Transport, ProvisionDefaults { capacity: 10, price: 50.0 }),
            (ProviderType::Other, ProvisionDefaults { capacity: 20, price: 100.0 }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioned_row_satisfies_invariant() {
        let defaults = ProvisionDefaults { capacity: 50, price: 100.0 };
        let row = CapacityRow::provisioned(
            ProviderType::Hotel,
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            &defaults,
            "USD",
        );
        assert!(row.invariant_holds());
        assert_eq!(row.available_capacity, 50);
        assert_eq!(row.version, 1);
    }

    #[test]
    fn invariant_detects_drift() {
        let defaults = ProvisionDefaults { capacity: 10, price: 1.0 };
        let mut row = CapacityRow::provisioned(
            ProviderType::Other,
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            &defaults,
            "USD",
        );
        row.allocated_capacity += 1;
        assert!(!row.invariant_holds());
    }

    #[test]
    fn standard_map_covers_every_provider() {
        let map = ProvisionDefaults::standard_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map[&ProviderType::Transport].capacity, 10);
    }
}
