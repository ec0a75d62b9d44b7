use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use voya_domain::{Allocation, AllocationBreakdown, ProviderType, ProvisionDefaults, ServiceRequest};
use voya_store::{ApprovalRules, StoreTx};

use crate::collaborators::PriceLookup;
use crate::error::ApprovalError;
use crate::ledger::LedgerStrategy;
use crate::rooms::RoomCalendarStrategy;
use crate::seats::SeatCounterStrategy;

/// Caller-supplied knobs for a single approval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalOptions {
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub pricing: Option<PricingOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingOverride {
    pub unit_price: Option<f64>,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseOptions {
    pub reason: Option<String>,
}

/// What a strategy captured for the allocation record.
#[derive(Debug, Clone)]
pub struct ReservationOutcome {
    pub breakdown: AllocationBreakdown,
    pub total_price: f64,
    pub currency: String,
}

/// One reservation discipline per provider type. All methods run inside the
/// orchestrator's transaction; a strategy never commits or retries itself.
#[async_trait]
pub trait ReservationStrategy<T: StoreTx>: Send + Sync {
    async fn validate(&self, tx: &mut T, request: &ServiceRequest) -> Result<(), ApprovalError>;

    async fn reserve(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
        options: &ApprovalOptions,
    ) -> Result<ReservationOutcome, ApprovalError>;

    async fn release(&self, tx: &mut T, allocation: &Allocation) -> Result<(), ApprovalError>;
}

/// Provider-type dispatch table.
pub struct StrategyRegistry<T: StoreTx> {
    strategies: HashMap<ProviderType, Arc<dyn ReservationStrategy<T>>>,
}

impl<T: StoreTx + 'static> StrategyRegistry<T> {
    /// Standard wiring: hotels run the room-calendar gate in front of the
    /// ledger, flights use the seat counter, everything else is plain ledger.
    pub fn standard(
        rules: &ApprovalRules,
        provisioning: HashMap<ProviderType, ProvisionDefaults>,
        price_lookup: Arc<dyn PriceLookup>,
    ) -> Self {
        let ledger = LedgerStrategy::new(provisioning, price_lookup);
        let mut strategies: HashMap<ProviderType, Arc<dyn ReservationStrategy<T>>> = HashMap::new();
        strategies.insert(
            ProviderType::Hotel,
            Arc::new(RoomCalendarStrategy::new(ledger.clone())),
        );
        strategies.insert(
            ProviderType::Flight,
            Arc::new(SeatCounterStrategy::new(rules.default_fare)),
        );
        let shared = Arc::new(ledger);
        strategies.insert(ProviderType::Transport, shared.clone());
        strategies.insert(ProviderType::Other, shared);
        StrategyRegistry { strategies }
    }

    pub fn get(&self, provider_type: ProviderType) -> Option<Arc<dyn ReservationStrategy<T>>> {
        self.strategies.get(&provider_type).cloned()
    }
}
