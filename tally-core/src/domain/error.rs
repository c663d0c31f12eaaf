use thiserror::Error;

use super::models::{EntryId, EscrowId, OrderId, PartyId, RequestId};
use super::ports::outbound::{EscrowGatewayError, RateSourceError, StoreError};

/// Errors that can occur during time tracking and settlement operations.
///
/// Local validation failures are returned before anything is written, so a
/// caller seeing one of these can assume no partial state change. `Conflict`
/// means the tracking record changed between read and commit; the whole
/// operation can be retried.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("no time tracking for order: {0}")]
    OrderNotFound(OrderId),
    #[error("time entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("approval request not found: {0}")]
    RequestNotFound(RequestId),
    #[error("escrow not found: {0}")]
    EscrowNotFound(EscrowId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("status conflict: {0}")]
    StatusConflict(String),
    #[error("no hourly rate resolvable for provider: {0}")]
    RateUnresolved(PartyId),
    #[error("no eligible entries to submit")]
    NothingToSubmit,
    #[error("no approved billable entries to settle")]
    NothingApproved,
    #[error("approval request already resolved: {0}")]
    AlreadyResolved(RequestId),
    #[error("escrow already released: {0}")]
    AlreadyReleased(EscrowId),
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("tracking record changed concurrently, retry the operation")]
    Conflict,
    #[error("store failure: {0}")]
    Store(String),
}

impl From<StoreError> for TrackingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RevisionConflict | StoreError::AlreadyExists => Self::Conflict,
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl From<EscrowGatewayError> for TrackingError {
    fn from(err: EscrowGatewayError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

impl From<RateSourceError> for TrackingError {
    fn from(err: RateSourceError) -> Self {
        Self::ExternalService(err.to_string())
    }
}
