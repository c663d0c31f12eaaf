use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::models::{OrderId, OrderTimeTracking};
use crate::domain::ports::outbound::{
    StoreError, TrackingFilter, TrackingStore, VersionedTracking,
};

/// Tracking store backed by an in-memory HashMap.
///
/// Implements the same revision compare-and-swap contract as the Postgres
/// adapter, so service tests exercise the real conflict paths.
#[derive(Clone, Default)]
pub struct InMemoryTrackingStore {
    records: Arc<RwLock<HashMap<OrderId, VersionedTracking>>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked orders (for test assertions).
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn get(&self, order_id: &OrderId) -> Result<Option<VersionedTracking>, StoreError> {
        Ok(self.records.read().unwrap().get(order_id).cloned())
    }

    async fn create(&self, tracking: &OrderTimeTracking) -> Result<i64, StoreError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&tracking.order_id) {
            return Err(StoreError::AlreadyExists);
        }
        records.insert(
            tracking.order_id.clone(),
            VersionedTracking {
                revision: 1,
                tracking: tracking.clone(),
            },
        );
        Ok(1)
    }

    async fn update(
        &self,
        order_id: &OrderId,
        expected_revision: i64,
        tracking: &OrderTimeTracking,
    ) -> Result<i64, StoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(order_id)
            .ok_or(StoreError::RevisionConflict)?;
        if record.revision != expected_revision {
            return Err(StoreError::RevisionConflict);
        }
        record.revision += 1;
        record.tracking = tracking.clone();
        Ok(record.revision)
    }

    async fn find(&self, filter: &TrackingFilter) -> Result<Vec<OrderTimeTracking>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|record| {
                let t = &record.tracking;
                if let Some(ref provider_id) = filter.provider_id {
                    if &t.provider_id != provider_id {
                        return false;
                    }
                }
                if let Some(ref customer_id) = filter.customer_id {
                    if &t.customer_id != customer_id {
                        return false;
                    }
                }
                if let Some(ref statuses) = filter.statuses {
                    if !statuses.contains(&t.status) {
                        return false;
                    }
                }
                true
            })
            .map(|record| record.tracking.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrderContext;
    use time::OffsetDateTime;

    fn tracking(order_id: &str) -> OrderTimeTracking {
        let ctx = OrderContext::new(order_id, "cust-1", "prov-1");
        OrderTimeTracking::new(&ctx, 4000, 8.0, OffsetDateTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = InMemoryTrackingStore::new();
        let revision = store.create(&tracking("order-1")).await.unwrap();
        assert_eq!(revision, 1);

        let loaded = store.get(&OrderId::from("order-1")).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.tracking.order_id.as_str(), "order-1");
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryTrackingStore::new();
        store.create(&tracking("order-1")).await.unwrap();

        let err = store.create(&tracking("order-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let store = InMemoryTrackingStore::new();
        store.create(&tracking("order-1")).await.unwrap();
        let order_id = OrderId::from("order-1");

        // First writer wins, second writer holds the stale revision.
        let first = store.get(&order_id).await.unwrap().unwrap();
        let second = store.get(&order_id).await.unwrap().unwrap();

        let revision = store
            .update(&order_id, first.revision, &first.tracking)
            .await
            .unwrap();
        assert_eq!(revision, 2);

        let err = store
            .update(&order_id, second.revision, &second.tracking)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict));
    }

    #[tokio::test]
    async fn find_filters_by_provider() {
        let store = InMemoryTrackingStore::new();
        store.create(&tracking("order-1")).await.unwrap();

        let ctx = OrderContext::new("order-2", "cust-2", "prov-2");
        store
            .create(&OrderTimeTracking::new(
                &ctx,
                5000,
                0.0,
                OffsetDateTime::UNIX_EPOCH,
            ))
            .await
            .unwrap();

        let found = store
            .find(&TrackingFilter::by_provider("prov-1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order_id.as_str(), "order-1");
    }
}
