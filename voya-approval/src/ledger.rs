use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use voya_domain::{
    Allocation, AllocationBreakdown, CapacityRow, DayAllocation, ProviderType, ProvisionDefaults,
    ServiceRequest,
};
use voya_store::StoreTx;

use crate::error::ApprovalError;
use crate::strategy::{ApprovalOptions, ReservationOutcome, ReservationStrategy};
use crate::PriceLookup;

/// Date-indexed capacity discipline for generic and hotel inventory.
///
/// Rows for the whole range are locked in ascending date order, missing
/// dates are auto-provisioned from the configured defaults, sufficiency is
/// judged across the full range, and the actual debit is a per-date version
/// CAS. The CAS is the real safety net: there is deliberately no extra
/// sufficiency re-check between provisioning and commit.
#[derive(Clone)]
pub struct LedgerStrategy {
    provisioning: HashMap<ProviderType, ProvisionDefaults>,
    price_lookup: Arc<dyn PriceLookup>,
}

impl LedgerStrategy {
    pub fn new(
        provisioning: HashMap<ProviderType, ProvisionDefaults>,
        price_lookup: Arc<dyn PriceLookup>,
    ) -> Self {
        LedgerStrategy {
            provisioning,
            price_lookup,
        }
    }

    fn defaults_for(&self, provider_type: ProviderType) -> ProvisionDefaults {
        self.provisioning
            .get(&provider_type)
            .copied()
            .or_else(|| ProvisionDefaults::standard_map().get(&provider_type).copied())
            .unwrap_or(ProvisionDefaults { capacity: 0, price: 0.0 })
    }

    /// Lock every row in the range, creating missing dates at the
    /// provider-type default capacity and price.
    async fn lock_range<T: StoreTx>(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
        dates: &[NaiveDate],
    ) -> Result<Vec<CapacityRow>, ApprovalError> {
        let defaults = self.defaults_for(request.provider_type);
        let mut rows = Vec::with_capacity(dates.len());
        for date in dates {
            match tx
                .ledger_row_for_update(request.provider_type, request.item_id, *date)
                .await?
            {
                Some(row) => rows.push(row),
                None => {
                    let fresh = CapacityRow::provisioned(
                        request.provider_type,
                        request.item_id,
                        *date,
                        &defaults,
                        &request.currency,
                    );
                    tx.insert_ledger_row(&fresh).await?;
                    debug!(
                        item_id = %request.item_id,
                        date = %date,
                        capacity = defaults.capacity,
                        "auto-provisioned ledger row"
                    );
                    rows.push(fresh);
                }
            }
        }
        Ok(rows)
    }

    fn insufficient_dates(rows: &[CapacityRow], quantity: i32) -> Vec<NaiveDate> {
        rows.iter()
            .filter(|row| !row.is_open || row.available_capacity < quantity)
            .map(|row| row.date)
            .collect()
    }

    async fn unit_price_for(
        &self,
        request: &ServiceRequest,
        row: &CapacityRow,
        override_price: Option<f64>,
    ) -> Result<f64, ApprovalError> {
        if let Some(price) = override_price {
            return Ok(price);
        }
        let looked_up = self
            .price_lookup
            .unit_price(request.provider_type, request.item_id, row.date)
            .await?;
        Ok(looked_up.unwrap_or(row.base_price))
    }
}

#[async_trait]
impl<T: StoreTx + 'static> ReservationStrategy<T> for LedgerStrategy {
    async fn validate(&self, _tx: &mut T, request: &ServiceRequest) -> Result<(), ApprovalError> {
        if request.stay_dates().is_empty() {
            return Err(ApprovalError::InvalidState(
                "stay must cover at least one night".to_string(),
            ));
        }
        Ok(())
    }

    async fn reserve(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
        options: &ApprovalOptions,
    ) -> Result<ReservationOutcome, ApprovalError> {
        let dates = request.stay_dates();
        if dates.is_empty() {
            return Err(ApprovalError::InvalidState(
                "stay must cover at least one night".to_string(),
            ));
        }

        let rows = self.lock_range(tx, request, &dates).await?;

        // Sufficiency is judged across the whole range so the failure names
        // every short date, and nothing is debited unless all dates pass.
        let short = Self::insufficient_dates(&rows, request.quantity);
        if !short.is_empty() {
            return Err(ApprovalError::InsufficientCapacity {
                requested: request.quantity,
                dates: short,
            });
        }

        let override_price = options.pricing.as_ref().and_then(|p| p.unit_price);
        let mut days = Vec::with_capacity(rows.len());
        for row in &rows {
            let debited = tx
                .debit_ledger(
                    request.provider_type,
                    request.item_id,
                    row.date,
                    request.quantity,
                    row.version,
                )
                .await?;
            if !debited {
                warn!(
                    item_id = %request.item_id,
                    date = %row.date,
                    "ledger version moved under us, aborting allocation"
                );
                return Err(ApprovalError::OptimisticLockFailed { date: row.date });
            }
            let unit_price = self.unit_price_for(request, row, override_price).await?;
            days.push(DayAllocation {
                date: row.date,
                quantity: request.quantity,
                unit_price,
            });
        }

        let breakdown = AllocationBreakdown::PerDay { days };
        let total_price = breakdown.total_price();
        Ok(ReservationOutcome {
            breakdown,
            total_price,
            currency: request.currency.clone(),
        })
    }

    async fn release(&self, tx: &mut T, allocation: &Allocation) -> Result<(), ApprovalError> {
        let AllocationBreakdown::PerDay { days } = &allocation.breakdown else {
            return Err(ApprovalError::ReleaseFailed(
                "allocation carries no per-day breakdown".to_string(),
            ));
        };
        for day in days {
            let credited = tx
                .credit_ledger(
                    allocation.provider_type,
                    allocation.item_id,
                    day.date,
                    day.quantity,
                )
                .await?;
            if !credited {
                return Err(ApprovalError::ReleaseFailed(format!(
                    "could not credit {} unit(s) back on {}",
                    day.quantity, day.date
                )));
            }
        }
        Ok(())
    }
}
