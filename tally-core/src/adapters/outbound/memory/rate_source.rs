use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::models::PartyId;
use crate::domain::ports::outbound::{RateSource, RateSourceError};

/// Rate source backed by a fixed map; providers without an entry resolve to
/// "no rate on file".
#[derive(Clone, Default)]
pub struct FixedRateSource {
    rates: HashMap<PartyId, i64>,
}

impl FixedRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, provider_id: impl Into<PartyId>, rate: i64) -> Self {
        self.rates.insert(provider_id.into(), rate);
        self
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    async fn hourly_rate(&self, provider_id: &PartyId) -> Result<Option<i64>, RateSourceError> {
        Ok(self.rates.get(provider_id).copied())
    }
}
