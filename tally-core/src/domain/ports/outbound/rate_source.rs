use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::PartyId;

#[derive(Debug, Error)]
pub enum RateSourceError {
    #[error("rate lookup failed: {0}")]
    Unavailable(String),
}

/// Outbound port resolving a provider's current hourly rate.
///
/// `Ok(None)` means the provider has no rate on file; the caller decides
/// what to do with that (the engine fails closed rather than guessing).
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Hourly rate in minor currency units, if the provider has one.
    async fn hourly_rate(&self, provider_id: &PartyId) -> Result<Option<i64>, RateSourceError>;
}
