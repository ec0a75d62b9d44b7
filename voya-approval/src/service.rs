use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use voya_domain::{
    Allocation, AllocationStatus, ProviderType, ProvisionDefaults, ServiceRequest,
};
use voya_store::{ApprovalRules, Store, StoreTx};

use crate::collaborators::{IdentityContext, NoDynamicPricing, PriceLookup, SystemIdentity};
use crate::error::ApprovalError;
use crate::strategy::{ApprovalOptions, ReleaseOptions, StrategyRegistry};

/// Aggregate result of a batch approval. One bad id never aborts the batch.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<BatchResult>,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub request_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One day of the read-only availability snapshot. Dates without a ledger
/// row are reported at the provider default with `provisioned: false`.
#[derive(Debug, Clone, Serialize)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub total_capacity: i32,
    pub allocated_capacity: i32,
    pub blocked_capacity: i32,
    pub available_capacity: i32,
    pub version: Option<i64>,
    pub base_price: f64,
    pub provisioned: bool,
}

/// The approval orchestrator: validates a request under an exclusive row
/// lock, dispatches to the provider-type strategy, and persists the
/// allocation — all in one transaction that either fully commits or leaves
/// no trace. The whole transaction (never a sub-step) is retried on
/// transient storage conflicts, up to a configured bound.
pub struct ApprovalService<S: Store> {
    store: S,
    registry: StrategyRegistry<S::Tx>,
    rules: ApprovalRules,
    provisioning: HashMap<ProviderType, ProvisionDefaults>,
    identity: Arc<dyn IdentityContext>,
}

impl<S: Store> ApprovalService<S> {
    pub fn new(
        store: S,
        rules: ApprovalRules,
        provisioning: HashMap<ProviderType, ProvisionDefaults>,
        price_lookup: Arc<dyn PriceLookup>,
        identity: Arc<dyn IdentityContext>,
    ) -> Self {
        let registry = StrategyRegistry::standard(&rules, provisioning.clone(), price_lookup);
        ApprovalService {
            store,
            registry,
            rules,
            provisioning,
            identity,
        }
    }

    /// Stock wiring: ledger base prices, system actor, default rules.
    pub fn with_defaults(store: S) -> Self {
        Self::new(
            store,
            ApprovalRules::default(),
            ProvisionDefaults::standard_map(),
            Arc::new(NoDynamicPricing),
            Arc::new(SystemIdentity),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn approve_request(
        &self,
        request_id: Uuid,
        options: &ApprovalOptions,
    ) -> Result<Allocation, ApprovalError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.approve_once(request_id, options).await {
                Err(err) if err.is_transient() => {
                    if attempt >= self.rules.max_retries {
                        warn!(%request_id, attempts = attempt, "giving up after transient conflicts");
                        return Err(ApprovalError::RetryExhausted(attempt));
                    }
                    warn!(%request_id, attempt, "transient storage conflict, retrying approval");
                    tokio::time::sleep(Duration::from_millis(40 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }

    async fn approve_once(
        &self,
        request_id: Uuid,
        options: &ApprovalOptions,
    ) -> Result<Allocation, ApprovalError> {
        let mut tx = self.store.begin().await?;
        match self.approve_in_tx(&mut tx, request_id, options).await {
            Ok(allocation) => {
                tx.commit().await?;
                info!(
                    %request_id,
                    allocation_id = %allocation.id,
                    total = allocation.allocated_price,
                    "request approved"
                );
                Ok(allocation)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    error!(%request_id, error = %rb, "rollback failed after approval error");
                }
                Err(err)
            }
        }
    }

    async fn approve_in_tx(
        &self,
        tx: &mut S::Tx,
        request_id: Uuid,
        options: &ApprovalOptions,
    ) -> Result<Allocation, ApprovalError> {
        let request = tx
            .lock_request(request_id)
            .await?
            .ok_or(ApprovalError::RequestNotFound(request_id))?;

        // Preconditions re-checked under the row lock.
        if let Some(block) = request.approval_block(Utc::now()) {
            return Err(ApprovalError::InvalidState(block.to_string()));
        }

        let strategy = self.registry.get(request.provider_type).ok_or_else(|| {
            ApprovalError::Unexpected(format!(
                "no strategy registered for provider type {}",
                request.provider_type
            ))
        })?;

        strategy.validate(tx, &request).await?;
        let outcome = strategy.reserve(tx, &request, options).await?;

        let allocation = self.build_allocation(&request, options, outcome);
        tx.insert_allocation(&allocation).await?;
        tx.mark_request_approved(
            request_id,
            &allocation.approved_by,
            options.notes.as_deref(),
            options.terms.as_deref(),
        )
        .await?;
        Ok(allocation)
    }

    fn build_allocation(
        &self,
        request: &ServiceRequest,
        options: &ApprovalOptions,
        outcome: crate::strategy::ReservationOutcome,
    ) -> Allocation {
        let now = Utc::now();
        let commission_rate = options
            .pricing
            .as_ref()
            .and_then(|p| p.commission_rate)
            .unwrap_or(self.rules.default_commission_rate);
        Allocation {
            id: Uuid::new_v4(),
            request_id: request.id,
            provider_type: request.provider_type,
            item_id: request.item_id,
            status: AllocationStatus::Active,
            allocated_price: outcome.total_price,
            commission: outcome.total_price * commission_rate,
            currency: outcome.currency,
            breakdown: outcome.breakdown,
            approved_by: self.identity.current_actor(),
            expires_at: now + chrono::Duration::hours(self.rules.hold_window_hours),
            created_at: now,
            released_at: None,
            released_by: None,
            release_reason: None,
        }
    }

    /// Per-id isolation: one failed request never aborts the rest.
    pub async fn batch_approve(&self, request_ids: &[Uuid], options: &ApprovalOptions) -> BatchOutcome {
        let mut results = Vec::with_capacity(request_ids.len());
        let mut success_count = 0;
        for &request_id in request_ids {
            match self.approve_request(request_id, options).await {
                Ok(allocation) => {
                    success_count += 1;
                    results.push(BatchResult {
                        request_id,
                        success: true,
                        allocation_id: Some(allocation.id),
                        error_code: None,
                        message: None,
                    });
                }
                Err(err) => {
                    results.push(BatchResult {
                        request_id,
                        success: false,
                        allocation_id: None,
                        error_code: Some(err.code().to_string()),
                        message: Some(err.to_string()),
                    });
                }
            }
        }
        BatchOutcome {
            total: request_ids.len(),
            success_count,
            failure_count: request_ids.len() - success_count,
            results,
        }
    }

    pub async fn release_allocation(
        &self,
        allocation_id: Uuid,
        options: &ReleaseOptions,
    ) -> Result<(), ApprovalError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.release_once(allocation_id, options).await {
                Err(err) if err.is_transient() => {
                    if attempt >= self.rules.max_retries {
                        warn!(%allocation_id, attempts = attempt, "giving up release after transient conflicts");
                        return Err(ApprovalError::RetryExhausted(attempt));
                    }
                    tokio::time::sleep(Duration::from_millis(40 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }

    async fn release_once(
        &self,
        allocation_id: Uuid,
        options: &ReleaseOptions,
    ) -> Result<(), ApprovalError> {
        let mut tx = self.store.begin().await?;
        match self.release_in_tx(&mut tx, allocation_id, options).await {
            Ok(()) => {
                tx.commit().await?;
                info!(%allocation_id, "allocation released");
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    error!(%allocation_id, error = %rb, "rollback failed after release error");
                }
                Err(err)
            }
        }
    }

    async fn release_in_tx(
        &self,
        tx: &mut S::Tx,
        allocation_id: Uuid,
        options: &ReleaseOptions,
    ) -> Result<(), ApprovalError> {
        let allocation = tx
            .lock_allocation(allocation_id)
            .await?
            .ok_or(ApprovalError::AllocationNotFound(allocation_id))?;

        // Repeat releases fail cleanly here, before any crediting.
        if allocation.status != AllocationStatus::Active {
            return Err(ApprovalError::AllocationNotActive(allocation_id));
        }

        let strategy = self.registry.get(allocation.provider_type).ok_or_else(|| {
            ApprovalError::Unexpected(format!(
                "no strategy registered for provider type {}",
                allocation.provider_type
            ))
        })?;
        strategy.release(tx, &allocation).await?;

        tx.mark_allocation_released(
            allocation_id,
            &self.identity.current_actor(),
            options.reason.as_deref(),
        )
        .await?;
        Ok(())
    }

    /// Read-only per-day capacity snapshot; no locks held beyond the query.
    pub async fn availability_summary(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DaySnapshot>, ApprovalError> {
        if end < start {
            return Err(ApprovalError::InvalidState(
                "end date precedes start date".to_string(),
            ));
        }
        let rows = self.store.availability(provider_type, item_id, start, end).await?;
        let by_date: HashMap<NaiveDate, _> = rows.into_iter().map(|r| (r.date, r)).collect();
        let defaults = self
            .provisioning
            .get(&provider_type)
            .copied()
            .unwrap_or(ProvisionDefaults { capacity: 0, price: 0.0 });

        let mut snapshot = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            match by_date.get(&cursor) {
                Some(row) => snapshot.push(DaySnapshot {
                    date: cursor,
                    total_capacity: row.total_capacity,
                    allocated_capacity: row.allocated_capacity,
                    blocked_capacity: row.blocked_capacity,
                    available_capacity: row.available_capacity,
                    version: Some(row.version),
                    base_price: row.base_price,
                    provisioned: true,
                }),
                None => snapshot.push(DaySnapshot {
                    date: cursor,
                    total_capacity: defaults.capacity,
                    allocated_capacity: 0,
                    blocked_capacity: 0,
                    available_capacity: defaults.capacity,
                    version: None,
                    base_price: defaults.price,
                    provisioned: false,
                }),
            }
            cursor = match cursor.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(snapshot)
    }
}
