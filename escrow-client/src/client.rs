use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{AuthorizeHoldRequest, HoldRecord, ReleaseResult},
    EscrowApiUrl,
};

/// Client for the escrow/payment provider's REST API.
///
/// Every mutating call carries an `Idempotency-Key` header so that a retried
/// authorize or release is answered with the original result instead of
/// being executed twice.
pub struct EscrowClient {
    base_url: EscrowApiUrl,
    api_key: String,
    http: reqwest::Client,
}

impl EscrowClient {
    pub fn new(base_url: EscrowApiUrl, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: impl AsRef<str>,
        body: &B,
        idempotency_key: &str,
    ) -> Result<T, EscrowApiError> {
        let resp = self
            .http
            .post(url.as_ref())
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EscrowApiError::ResponseError(e.to_string()))?;

        let status = resp.status();
        if status == 401 || status == 403 {
            return Err(EscrowApiError::Unauthorized);
        }
        if status.is_client_error() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(EscrowApiError::Rejected(detail));
        }
        if !status.is_success() {
            return Err(EscrowApiError::ResponseError(format!(
                "unexpected status {}",
                status
            )));
        }

        let envelope = resp.json::<EscrowEnvelope<T>>().await.map_err(|e| {
            EscrowApiError::ParsingError(format!("Failed to parse response as JSON: {}", e))
        })?;
        envelope.into_data()
    }

    /// Authorize a new funds hold for an order.
    pub async fn authorize_hold(
        &self,
        request: &AuthorizeHoldRequest,
        idempotency_key: &str,
    ) -> Result<HoldRecord, EscrowApiError> {
        let url = self.base_url.append_path("/escrow/authorize");
        self.post(url, request, idempotency_key).await
    }

    /// Release a held escrow, initiating the payout to the provider.
    pub async fn release_hold(
        &self,
        escrow_id: &str,
        idempotency_key: &str,
    ) -> Result<ReleaseResult, EscrowApiError> {
        let url = self.base_url.append_path("/escrow/release");
        let body = ReleaseHoldBody { escrow_id };
        self.post(url, &body, idempotency_key).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseHoldBody<'a> {
    escrow_id: &'a str,
}

#[derive(Error, Debug)]
pub enum EscrowApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("ResponseError: {0}")]
    ResponseError(String),
    #[error("ParsingError: {0}")]
    ParsingError(String),
}

/// Generic response envelope from the escrow provider: a success flag plus
/// the payload, or an error message when `success` is false.
#[derive(Debug, Deserialize)]
struct EscrowEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> EscrowEnvelope<T> {
    fn into_data(self) -> Result<T, EscrowApiError> {
        if !self.success {
            return Err(EscrowApiError::Rejected(
                self.error.unwrap_or_else(|| "unknown provider error".to_string()),
            ));
        }
        self.data.ok_or_else(|| {
            EscrowApiError::ParsingError("successful response carried no payload".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HoldState;

    #[test]
    fn envelope_unwraps_payload() {
        let raw = r#"{"success":true,"data":{"escrowId":"esc-1","orderId":"o-1","amount":10500,"currency":"eur","state":"authorized"}}"#;
        let envelope: EscrowEnvelope<HoldRecord> = serde_json::from_str(raw).unwrap();
        let hold = envelope.into_data().unwrap();
        assert_eq!(hold.escrow_id, "esc-1");
        assert_eq!(hold.state, HoldState::Authorized);
    }

    #[test]
    fn envelope_surfaces_provider_error() {
        let raw = r#"{"success":false,"error":"insufficient funds"}"#;
        let envelope: EscrowEnvelope<HoldRecord> = serde_json::from_str(raw).unwrap();
        match envelope.into_data() {
            Err(EscrowApiError::Rejected(msg)) => assert_eq!(msg, "insufficient funds"),
            other => panic!("unexpected result: {:?}", other.map(|h| h.escrow_id)),
        }
    }
}
