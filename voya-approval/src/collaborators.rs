use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use voya_domain::ProviderType;

use crate::error::ApprovalError;

/// External price-lookup capability. Consulted per (item, date) only when
/// no explicit override price is supplied; `None` falls back to the
/// ledger's base price.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn unit_price(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<f64>, ApprovalError>;
}

/// Lookup that defers to ledger base prices everywhere.
pub struct NoDynamicPricing;

#[async_trait]
impl PriceLookup for NoDynamicPricing {
    async fn unit_price(
        &self,
        _provider_type: ProviderType,
        _item_id: Uuid,
        _date: NaiveDate,
    ) -> Result<Option<f64>, ApprovalError> {
        Ok(None)
    }
}

/// Supplies the actor id stamped onto approver/releaser fields.
pub trait IdentityContext: Send + Sync {
    fn current_actor(&self) -> String;
}

pub struct StaticIdentity(pub String);

impl IdentityContext for StaticIdentity {
    fn current_actor(&self) -> String {
        self.0.clone()
    }
}

/// Fallback identity for background jobs and tests.
pub struct SystemIdentity;

impl IdentityContext for SystemIdentity {
    fn current_actor(&self) -> String {
        "system".to_string()
    }
}
