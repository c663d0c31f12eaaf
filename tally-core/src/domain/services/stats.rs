use std::sync::Arc;

use crate::domain::{
    models::{EscrowStatus, OrderTimeTracking, PartyId, PartyStats, TrackingStatus},
    ports::outbound::{TrackingFilter, TrackingStore},
    TrackingError,
};

/// Read-only dashboard rollups over many orders. Never mutates; orders
/// without a tracking record simply do not show up in the scan and
/// contribute zero.
pub struct StatsService<S> {
    store: Arc<S>,
}

impl<S> StatsService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: TrackingStore> StatsService<S> {
    pub async fn provider_stats(&self, provider_id: &PartyId) -> Result<PartyStats, TrackingError> {
        let orders = self
            .store
            .find(&TrackingFilter::by_provider(provider_id.clone()))
            .await?;
        Ok(rollup(&orders))
    }

    pub async fn customer_stats(&self, customer_id: &PartyId) -> Result<PartyStats, TrackingError> {
        let orders = self
            .store
            .find(&TrackingFilter::by_customer(customer_id.clone()))
            .await?;
        Ok(rollup(&orders))
    }
}

fn rollup(orders: &[OrderTimeTracking]) -> PartyStats {
    let mut stats = PartyStats {
        total_orders: orders.len(),
        ..PartyStats::default()
    };

    for order in orders {
        if order.status != TrackingStatus::Completed {
            stats.active_orders += 1;
        }
        stats.total_logged_hours += order.total_logged_hours;
        stats.total_approved_hours += order.total_approved_hours;
        stats.total_billed_hours += order.total_billed_hours;

        if let Some(hold) = &order.escrow {
            match hold.status {
                EscrowStatus::Held => stats.pending_payout_amount += hold.provider_amount,
                EscrowStatus::Released => stats.released_payout_amount += hold.provider_amount,
                EscrowStatus::Authorized => {}
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::memory::{
        FixedRateSource, InMemoryTrackingStore, MockEscrowGateway,
    };
    use crate::config::SettlementSettings;
    use crate::domain::models::{EntryCategory, NewTimeEntry, OrderContext, OrderId};
    use crate::domain::services::{
        ApprovalDecision, ApprovalService, LedgerService, SettlementService,
    };
    use time::macros::date;

    async fn seed_order(store: &InMemoryTrackingStore, order: &str, provider: &str, hours: f64) {
        let ledger = LedgerService::new(
            Arc::new(store.clone()),
            Arc::new(FixedRateSource::new().with_rate(provider, 4000)),
        );
        let ctx = OrderContext::new(order, "cust-1", provider);
        let draft = NewTimeEntry::new(
            date!(2025 - 11 - 03),
            "09:00",
            hours,
            "extra work",
            EntryCategory::Additional,
        );
        ledger.log_time_entry(&ctx, draft).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_party_rolls_up_to_zero() {
        let store = InMemoryTrackingStore::new();
        seed_order(&store, "order-1", "prov-1", 2.0).await;

        let stats = StatsService::new(Arc::new(store))
            .provider_stats(&PartyId::from("prov-unknown"))
            .await
            .unwrap();
        assert_eq!(stats, PartyStats::default());
    }

    #[tokio::test]
    async fn provider_rollup_spans_orders_and_payouts() {
        let store = InMemoryTrackingStore::new();
        let gateway = MockEscrowGateway::new();
        seed_order(&store, "order-1", "prov-1", 2.0).await;
        seed_order(&store, "order-2", "prov-1", 3.0).await;
        seed_order(&store, "order-3", "prov-other", 5.0).await;

        // Settle order-1 up to a held escrow: 2h * 4000 = 8000, fee 360.
        let order_id = OrderId::from("order-1");
        let approval = ApprovalService::new(Arc::new(store.clone()));
        let entry_ids: Vec<_> = store
            .get(&order_id)
            .await
            .unwrap()
            .unwrap()
            .tracking
            .entries
            .iter()
            .map(|e| e.id.clone())
            .collect();
        let request_id = approval
            .submit_for_approval(&order_id, &entry_ids, None)
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

        let stats = StatsService::new(Arc::new(store))
            .provider_stats(&PartyId::from("prov-1"))
            .await
            .unwrap();

        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.active_orders, 2);
        assert_eq!(stats.total_logged_hours, 5.0);
        assert_eq!(stats.total_approved_hours, 2.0);
        assert_eq!(stats.total_billed_hours, 2.0);
        assert_eq!(stats.pending_payout_amount, 8_000 - 360);
        assert_eq!(stats.released_payout_amount, 0);
    }
}
