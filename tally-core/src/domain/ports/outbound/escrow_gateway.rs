use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{EscrowId, OrderId, PartyId};

#[derive(Debug, Error)]
pub enum EscrowGatewayError {
    #[error("hold rejected by payment provider: {0}")]
    Rejected(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Everything the payment provider needs to authorize a funds hold.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub provider_id: PartyId,
    /// Total to hold, minor currency units.
    pub amount: i64,
    pub currency: String,
    pub clearing_days: u32,
    /// Derived from the order and covered entry set so a retried authorize
    /// lands on the same hold instead of charging twice.
    pub idempotency_key: String,
}

/// Outbound port for the external escrow/payment API.
///
/// Both calls may block on network I/O and must be given an idempotency
/// key; the engine commits local state only after a call succeeds.
#[async_trait]
pub trait EscrowGateway: Send + Sync {
    /// Authorize a hold and return the provider-issued escrow id.
    async fn authorize(&self, request: &HoldRequest) -> Result<EscrowId, EscrowGatewayError>;

    /// Release a held escrow towards the provider.
    async fn release(
        &self,
        escrow_id: &EscrowId,
        idempotency_key: &str,
    ) -> Result<(), EscrowGatewayError>;
}
