use async_trait::async_trait;

use escrow_client::{
    domain::AuthorizeHoldRequest, EscrowApiError, EscrowApiUrl, EscrowClient,
};

use crate::config::EscrowApiSettings;
use crate::domain::models::EscrowId;
use crate::domain::ports::outbound::{EscrowGateway, EscrowGatewayError, HoldRequest};

/// Adapter that wraps the escrow provider's client to implement the
/// EscrowGateway port.
pub struct EscrowApiAdapter {
    client: EscrowClient,
}

impl EscrowApiAdapter {
    pub fn new(settings: &EscrowApiSettings) -> Self {
        let client = EscrowClient::new(
            EscrowApiUrl::new(settings.base_url.clone()),
            settings.api_key.clone(),
        );
        Self { client }
    }
}

#[async_trait]
impl EscrowGateway for EscrowApiAdapter {
    async fn authorize(&self, request: &HoldRequest) -> Result<EscrowId, EscrowGatewayError> {
        let api_request = AuthorizeHoldRequest::new(
            request.order_id.as_str(),
            request.customer_id.as_str(),
            request.provider_id.as_str(),
            request.amount,
            request.currency.clone(),
        )
        .with_clearing_days(request.clearing_days);

        let hold = self
            .client
            .authorize_hold(&api_request, &request.idempotency_key)
            .await
            .map_err(map_escrow_api_error)?;

        Ok(EscrowId::new(hold.escrow_id))
    }

    async fn release(
        &self,
        escrow_id: &EscrowId,
        idempotency_key: &str,
    ) -> Result<(), EscrowGatewayError> {
        self.client
            .release_hold(escrow_id.as_str(), idempotency_key)
            .await
            .map_err(map_escrow_api_error)?;
        Ok(())
    }
}

fn map_escrow_api_error(err: EscrowApiError) -> EscrowGatewayError {
    match err {
        EscrowApiError::Unauthorized => {
            EscrowGatewayError::Rejected("unauthorized against payment provider".to_string())
        }
        EscrowApiError::Rejected(msg) => EscrowGatewayError::Rejected(msg),
        EscrowApiError::ResponseError(msg) | EscrowApiError::ParsingError(msg) => {
            EscrowGatewayError::Unavailable(msg)
        }
    }
}
