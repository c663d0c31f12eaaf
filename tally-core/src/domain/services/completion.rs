use std::sync::Arc;

use time::OffsetDateTime;

use crate::domain::{
    models::{CompletionStatus, EscrowStatus, OrderId},
    ports::outbound::{EscrowGateway, TrackingStore},
    TrackingError,
};

use super::SettlementService;

/// Which side of the order is confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletingParty {
    Customer,
    Provider,
}

/// Tracks the two "work is done" acknowledgements and triggers the fund
/// release exactly once, after both parties have confirmed.
///
/// Decoupled from the approval workflow on purpose: an order can have all
/// billable hours approved and paid into escrow while the parties have not
/// yet both signed off on the project itself.
pub struct CompletionService<S, G> {
    store: Arc<S>,
    settlement: SettlementService<S, G>,
}

impl<S, G> CompletionService<S, G> {
    pub fn new(store: Arc<S>, settlement: SettlementService<S, G>) -> Self {
        Self { store, settlement }
    }
}

impl<S: TrackingStore, G: EscrowGateway> CompletionService<S, G> {
    pub async fn mark_customer_complete(
        &self,
        order_id: &OrderId,
        note: Option<String>,
    ) -> Result<CompletionStatus, TrackingError> {
        self.mark_complete(order_id, CompletingParty::Customer, note)
            .await
    }

    pub async fn mark_provider_complete(
        &self,
        order_id: &OrderId,
        note: Option<String>,
    ) -> Result<CompletionStatus, TrackingError> {
        self.mark_complete(order_id, CompletingParty::Provider, note)
            .await
    }

    /// Record one party's acknowledgement. Repeat calls refresh the
    /// timestamp and note; they never un-confirm.
    pub async fn mark_complete(
        &self,
        order_id: &OrderId,
        party: CompletingParty,
        note: Option<String>,
    ) -> Result<CompletionStatus, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let now = OffsetDateTime::now_utc();
        match party {
            CompletingParty::Customer => {
                tracking.completion.customer_marked_complete_at = Some(now);
                tracking.completion.customer_note = note;
            }
            CompletingParty::Provider => {
                tracking.completion.provider_marked_complete_at = Some(now);
                tracking.completion.provider_note = note;
            }
        }
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, party = ?party, "marked order complete");

        self.maybe_release(order_id).await
    }

    pub async fn completion_status(
        &self,
        order_id: &OrderId,
    ) -> Result<CompletionStatus, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        Ok(versioned.tracking.completion)
    }

    /// Release the escrow once both parties have confirmed.
    ///
    /// The `escrow_release_initiated` guard is committed only after a
    /// successful release, so a payment-API failure leaves the order
    /// retriable by the next confirmation call. Orders without a held
    /// escrow simply keep their completion state.
    async fn maybe_release(&self, order_id: &OrderId) -> Result<CompletionStatus, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let tracking = versioned.tracking;

        if !tracking.completion.both_parties_complete()
            || tracking.completion.escrow_release_initiated
        {
            return Ok(tracking.completion);
        }
        let held = tracking
            .escrow
            .as_ref()
            .is_some_and(|hold| hold.status == EscrowStatus::Held);
        if !held {
            return Ok(tracking.completion);
        }

        match self.settlement.release_escrow(order_id).await {
            Ok(_) => {}
            // Someone else already paid out; just record the guard below.
            Err(TrackingError::AlreadyReleased(_)) => {}
            Err(err) => return Err(err),
        }

        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;
        tracking.completion.escrow_release_initiated = true;
        tracking.touch(OffsetDateTime::now_utc());
        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, "escrow release initiated after both confirmations");
        Ok(tracking.completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::memory::{
        FixedRateSource, InMemoryTrackingStore, MockEscrowGateway,
    };
    use crate::config::SettlementSettings;
    use crate::domain::models::{EntryCategory, NewTimeEntry, OrderContext, OrderId};
    use crate::domain::services::{ApprovalDecision, ApprovalService, LedgerService};
    use time::macros::date;

    fn ctx() -> OrderContext {
        OrderContext::new("order-1", "cust-1", "prov-1")
    }

    fn completion(
        store: &InMemoryTrackingStore,
        gateway: &MockEscrowGateway,
    ) -> CompletionService<InMemoryTrackingStore, MockEscrowGateway> {
        let settlement = SettlementService::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            SettlementSettings::default(),
        );
        CompletionService::new(Arc::new(store.clone()), settlement)
    }

    /// An order with a held escrow over 2h of approved additional work.
    async fn seed_held_escrow(store: &InMemoryTrackingStore, gateway: &MockEscrowGateway) {
        let ledger = LedgerService::new(
            Arc::new(store.clone()),
            Arc::new(FixedRateSource::new().with_rate("prov-1", 4000)),
        );
        let draft = NewTimeEntry::new(
            date!(2025 - 11 - 03),
            "09:00",
            2.0,
            "extra work",
            EntryCategory::Additional,
        );
        let entry_id = ledger.log_time_entry(&ctx(), draft).await.unwrap();

        let order_id = OrderId::from("order-1");
        let approval = ApprovalService::new(Arc::new(store.clone()));
        let request_id = approval
            .submit_for_approval(&order_id, &[entry_id], None)
            .await
            .unwrap();
        approval
            .process_customer_approval(&order_id, &request_id, ApprovalDecision::Approved, None, None)
            .await
            .unwrap();

        let settlement = SettlementService::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            SettlementSettings::default(),
        );
        let escrow_id = settlement.create_escrow(&order_id).await.unwrap();
        settlement
            .mark_escrow_paid(&order_id, &escrow_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn confirmation_order_does_not_matter() {
        let order_id = OrderId::from("order-1");

        for customer_first in [true, false] {
            let store = InMemoryTrackingStore::new();
            let gateway = MockEscrowGateway::new();
            seed_held_escrow(&store, &gateway).await;
            let service = completion(&store, &gateway);

            let first = if customer_first {
                service.mark_customer_complete(&order_id, None).await.unwrap()
            } else {
                service.mark_provider_complete(&order_id, None).await.unwrap()
            };
            assert!(!first.both_parties_complete());
            assert_eq!(gateway.release_calls(), 0);

            let second = if customer_first {
                service.mark_provider_complete(&order_id, None).await.unwrap()
            } else {
                service.mark_customer_complete(&order_id, None).await.unwrap()
            };
            assert!(second.both_parties_complete());
            assert!(second.escrow_release_initiated);
            assert_eq!(gateway.release_calls(), 1);
        }
    }

    #[tokio::test]
    async fn repeated_confirmations_release_only_once() {
        let store = InMemoryTrackingStore::new();
        let gateway = MockEscrowGateway::new();
        seed_held_escrow(&store, &gateway).await;
        let service = completion(&store, &gateway);
        let order_id = OrderId::from("order-1");

        service.mark_customer_complete(&order_id, None).await.unwrap();
        service.mark_provider_complete(&order_id, None).await.unwrap();
        service
            .mark_provider_complete(&order_id, Some("still done".into()))
            .await
            .unwrap();
        service.mark_customer_complete(&order_id, None).await.unwrap();

        assert_eq!(gateway.release_calls(), 1);
    }

    #[tokio::test]
    async fn release_failure_stays_retriable() {
        let store = InMemoryTrackingStore::new();
        let gateway = MockEscrowGateway::new().with_release_failure("provider down");
        seed_held_escrow(&store, &gateway).await;
        let service = completion(&store, &gateway);
        let order_id = OrderId::from("order-1");

        service.mark_customer_complete(&order_id, None).await.unwrap();
        let err = service
            .mark_provider_complete(&order_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::ExternalService(_)));

        let status = service.completion_status(&order_id).await.unwrap();
        assert!(status.both_parties_complete());
        assert!(!status.escrow_release_initiated, "guard must stay clear");

        gateway.heal();
        let status = service
            .mark_provider_complete(&order_id, None)
            .await
            .unwrap();
        assert!(status.escrow_release_initiated);
        assert_eq!(gateway.release_calls(), 2, "one failed try, one payout");
    }

    #[tokio::test]
    async fn orders_without_escrow_complete_quietly() {
        let store = InMemoryTrackingStore::new();
        let gateway = MockEscrowGateway::new();
        let ledger = LedgerService::new(
            Arc::new(store.clone()),
            Arc::new(FixedRateSource::new().with_rate("prov-1", 4000)),
        );
        ledger
            .log_time_entry(
                &ctx(),
                NewTimeEntry::new(
                    date!(2025 - 11 - 03),
                    "09:00",
                    8.0,
                    "planned work",
                    EntryCategory::Original,
                ),
            )
            .await
            .unwrap();

        let service = completion(&store, &gateway);
        let order_id = OrderId::from("order-1");

        service.mark_customer_complete(&order_id, None).await.unwrap();
        let status = service
            .mark_provider_complete(&order_id, None)
            .await
            .unwrap();

        assert!(status.both_parties_complete());
        assert!(!status.escrow_release_initiated);
        assert_eq!(gateway.release_calls(), 0);
    }
}
