use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::models::EscrowId;
use crate::domain::ports::outbound::{EscrowGateway, EscrowGatewayError, HoldRequest};

/// Mock escrow gateway with call counters.
///
/// Behaves like the real provider with respect to idempotency: repeating an
/// authorize with a key it has already seen returns the original escrow id
/// instead of minting a second hold. Tests use the counters to assert that
/// the engine talks to the payment API at most once per action.
#[derive(Clone, Default)]
pub struct MockEscrowGateway {
    id_seq: Arc<AtomicU64>,
    authorize_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
    holds_by_key: Arc<RwLock<HashMap<String, EscrowId>>>,
    released_keys: Arc<RwLock<HashMap<String, EscrowId>>>,
    authorize_failure: Arc<RwLock<Option<String>>>,
    release_failure: Arc<RwLock<Option<String>>>,
}

#[allow(dead_code)]
impl MockEscrowGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every authorize call fail with the given message.
    pub fn with_authorize_failure(self, message: impl Into<String>) -> Self {
        *self.authorize_failure.write().unwrap() = Some(message.into());
        self
    }

    /// Make every release call fail with the given message.
    pub fn with_release_failure(self, message: impl Into<String>) -> Self {
        *self.release_failure.write().unwrap() = Some(message.into());
        self
    }

    /// Clear a previously configured failure.
    pub fn heal(&self) {
        *self.authorize_failure.write().unwrap() = None;
        *self.release_failure.write().unwrap() = None;
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EscrowGateway for MockEscrowGateway {
    async fn authorize(&self, request: &HoldRequest) -> Result<EscrowId, EscrowGatewayError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.authorize_failure.read().unwrap().as_ref() {
            return Err(EscrowGatewayError::Unavailable(message.clone()));
        }
        if request.amount <= 0 {
            return Err(EscrowGatewayError::Rejected("non-positive amount".into()));
        }

        let mut holds = self.holds_by_key.write().unwrap();
        if let Some(existing) = holds.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let id = EscrowId::new(format!("escrow-{}", self.id_seq.fetch_add(1, Ordering::SeqCst) + 1));
        holds.insert(request.idempotency_key.clone(), id.clone());
        Ok(id)
    }

    async fn release(
        &self,
        escrow_id: &EscrowId,
        idempotency_key: &str,
    ) -> Result<(), EscrowGatewayError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.release_failure.read().unwrap().as_ref() {
            return Err(EscrowGatewayError::Unavailable(message.clone()));
        }

        let mut released = self.released_keys.write().unwrap();
        if released.contains_key(idempotency_key) {
            // Provider-side idempotency: a replayed release is a no-op.
            return Ok(());
        }
        released.insert(idempotency_key.to_string(), escrow_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OrderId, PartyId};

    fn hold_request(key: &str) -> HoldRequest {
        HoldRequest {
            order_id: OrderId::from("order-1"),
            customer_id: PartyId::from("cust-1"),
            provider_id: PartyId::from("prov-1"),
            amount: 10_500,
            currency: "eur".to_string(),
            clearing_days: 14,
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_key_returns_same_hold() {
        let gateway = MockEscrowGateway::new();

        let first = gateway.authorize(&hold_request("k1")).await.unwrap();
        let second = gateway.authorize(&hold_request("k1")).await.unwrap();
        let other = gateway.authorize(&hold_request("k2")).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(gateway.authorize_calls(), 3);
    }

    #[tokio::test]
    async fn configured_failure_surfaces() {
        let gateway = MockEscrowGateway::new().with_authorize_failure("timeout");

        let err = gateway.authorize(&hold_request("k1")).await.unwrap_err();
        assert!(matches!(err, EscrowGatewayError::Unavailable(_)));

        gateway.heal();
        assert!(gateway.authorize(&hold_request("k1")).await.is_ok());
    }
}
