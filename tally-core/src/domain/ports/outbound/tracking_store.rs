use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{OrderId, OrderTimeTracking, PartyId, TrackingStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracking record already exists")]
    AlreadyExists,
    #[error("revision mismatch, record changed since read")]
    RevisionConflict,
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A tracking document together with the revision it was read at.
#[derive(Debug, Clone)]
pub struct VersionedTracking {
    pub revision: i64,
    pub tracking: OrderTimeTracking,
}

/// Query filter for the read-side scan used by the stats rollups.
#[derive(Debug, Clone, Default)]
pub struct TrackingFilter {
    pub provider_id: Option<PartyId>,
    pub customer_id: Option<PartyId>,
    pub statuses: Option<Vec<TrackingStatus>>,
}

impl TrackingFilter {
    pub fn by_provider(provider_id: impl Into<PartyId>) -> Self {
        Self {
            provider_id: Some(provider_id.into()),
            ..Self::default()
        }
    }

    pub fn by_customer(customer_id: impl Into<PartyId>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<TrackingStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }
}

/// Outbound port for the order-tracking document store.
///
/// The store holds one document per order and guards every replacement with
/// a revision compare-and-swap. There is deliberately no partial-update
/// surface: services read, transform and commit the whole document, and a
/// concurrent writer shows up as `RevisionConflict`. This is what makes
/// per-order read-modify-write atomic across service instances without any
/// in-process locking.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn get(&self, order_id: &OrderId) -> Result<Option<VersionedTracking>, StoreError>;

    /// Insert a fresh document at revision 1. Fails with `AlreadyExists`
    /// when the order is already tracked.
    async fn create(&self, tracking: &OrderTimeTracking) -> Result<i64, StoreError>;

    /// Replace the document iff the stored revision still equals
    /// `expected_revision`. Returns the new revision.
    async fn update(
        &self,
        order_id: &OrderId,
        expected_revision: i64,
        tracking: &OrderTimeTracking,
    ) -> Result<i64, StoreError>;

    /// Scan documents matching the filter. Read-only.
    async fn find(&self, filter: &TrackingFilter) -> Result<Vec<OrderTimeTracking>, StoreError>;
}
