use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, QueryBuilder};

use crate::domain::models::{OrderId, OrderTimeTracking};
use crate::domain::ports::outbound::{
    StoreError, TrackingFilter, TrackingStore, VersionedTracking,
};

/// Tracking store on PostgreSQL.
///
/// The document is stored whole as JSONB next to a `revision` column; every
/// replacement is conditioned on the revision the caller read, so two
/// service instances racing on one order cannot interleave partial writes.
/// Provider, customer and status are mirrored into columns for the
/// stats-side scans.
pub struct PostgresTrackingStore {
    pool: PgPool,
}

impl PostgresTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct TrackingRow {
    revision: i64,
    document: Json<OrderTimeTracking>,
}

impl From<TrackingRow> for VersionedTracking {
    fn from(row: TrackingRow) -> Self {
        Self {
            revision: row.revision,
            tracking: row.document.0,
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl TrackingStore for PostgresTrackingStore {
    async fn get(&self, order_id: &OrderId) -> Result<Option<VersionedTracking>, StoreError> {
        let row = sqlx::query_as::<_, TrackingRow>(
            r#"
            SELECT revision, document
            FROM order_time_tracking
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(VersionedTracking::from))
    }

    async fn create(&self, tracking: &OrderTimeTracking) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_time_tracking
                (order_id, provider_id, customer_id, status, revision, document)
            VALUES ($1, $2, $3, $4, 1, $5)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(tracking.order_id.as_str())
        .bind(tracking.provider_id.as_str())
        .bind(tracking.customer_id.as_str())
        .bind(tracking.status.to_string())
        .bind(Json(tracking))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists);
        }
        Ok(1)
    }

    async fn update(
        &self,
        order_id: &OrderId,
        expected_revision: i64,
        tracking: &OrderTimeTracking,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE order_time_tracking
            SET document = $1, status = $2, revision = revision + 1, last_updated = now()
            WHERE order_id = $3 AND revision = $4
            "#,
        )
        .bind(Json(tracking))
        .bind(tracking.status.to_string())
        .bind(order_id.as_str())
        .bind(expected_revision)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RevisionConflict);
        }
        Ok(expected_revision + 1)
    }

    async fn find(&self, filter: &TrackingFilter) -> Result<Vec<OrderTimeTracking>, StoreError> {
        let mut query = QueryBuilder::new(
            "SELECT revision, document FROM order_time_tracking WHERE true",
        );
        if let Some(provider_id) = &filter.provider_id {
            query.push(" AND provider_id = ");
            query.push_bind(provider_id.as_str().to_string());
        }
        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ");
            query.push_bind(customer_id.as_str().to_string());
        }
        if let Some(statuses) = &filter.statuses {
            let statuses: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            query.push(" AND status = ANY(");
            query.push_bind(statuses);
            query.push(")");
        }

        let rows = query
            .build_query_as::<TrackingRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(|row| row.document.0).collect())
    }
}
