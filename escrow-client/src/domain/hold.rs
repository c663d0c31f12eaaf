use serde::{Deserialize, Serialize};

/// State of a hold as reported by the escrow provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    Authorized,
    Held,
    Released,
    Refunded,
    Disputed,
}

/// Request body for authorizing a new funds hold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeHoldRequest {
    pub order_id: String,
    pub buyer_id: String,
    pub provider_id: String,
    /// Amount in minor currency units (cents).
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearing_days: Option<u32>,
}

impl AuthorizeHoldRequest {
    pub fn new(
        order_id: impl Into<String>,
        buyer_id: impl Into<String>,
        provider_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            buyer_id: buyer_id.into(),
            provider_id: provider_id.into(),
            amount,
            currency: currency.into(),
            description: None,
            clearing_days: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_clearing_days(mut self, days: u32) -> Self {
        self.clearing_days = Some(days);
        self
    }
}

/// A hold record as returned by the escrow provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRecord {
    pub escrow_id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub state: HoldState,
    #[serde(default)]
    pub clearing_ends_at: Option<String>,
}

/// Response to a release call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResult {
    pub escrow_id: String,
    pub state: HoldState,
    #[serde(default)]
    pub payout_reference: Option<String>,
}
