use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::models::PartyId;
use crate::domain::ports::outbound::{RateSource, RateSourceError};

/// Rate source backed by the provider profile table.
pub struct PostgresRateSource {
    pool: PgPool,
}

impl PostgresRateSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateSource for PostgresRateSource {
    async fn hourly_rate(&self, provider_id: &PartyId) -> Result<Option<i64>, RateSourceError> {
        let rate = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT hourly_rate
            FROM provider_rates
            WHERE provider_id = $1
            "#,
        )
        .bind(provider_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RateSourceError::Unavailable(e.to_string()))?;

        Ok(rate)
    }
}
