use std::sync::Arc;

use itertools::Itertools;
use time::OffsetDateTime;

use crate::domain::{
    models::{
        ApprovalStatus, CustomerApprovalRequest, EntryCategory, EntryId, EntryStatus, OrderId,
        OrderTimeTracking, RequestId, TrackingStatus,
    },
    ports::outbound::TrackingStore,
    TrackingError,
};

/// The customer's verdict on a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    PartiallyApproved,
}

/// The approval workflow: batches ledger entries into customer approval
/// requests, applies the customer's decision to each referenced entry and
/// keeps the order-level status rolled up.
pub struct ApprovalService<S> {
    store: Arc<S>,
}

impl<S> ApprovalService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: TrackingStore> ApprovalService<S> {
    /// Batch still-`logged` entries into a pending approval request.
    ///
    /// Fails atomically: an unknown id or an entry outside `logged` rejects
    /// the whole submission and nothing is moved.
    pub async fn submit_for_approval(
        &self,
        order_id: &OrderId,
        entry_ids: &[EntryId],
        provider_message: Option<String>,
    ) -> Result<RequestId, TrackingError> {
        if entry_ids.is_empty() {
            return Err(TrackingError::InvalidInput("no entry ids given".into()));
        }
        let entry_ids: Vec<EntryId> = entry_ids.iter().unique().cloned().collect();

        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        for id in &entry_ids {
            let entry = tracking
                .entry(id)
                .ok_or_else(|| TrackingError::EntryNotFound(id.clone()))?;
            if entry.status != EntryStatus::Logged {
                return Err(TrackingError::StatusConflict(format!(
                    "entry {} is {} and cannot be submitted",
                    id, entry.status
                )));
            }
        }

        let request_id = self.open_request(&mut tracking, entry_ids, provider_message, false);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, request_id = %request_id, "submitted entries for approval");
        Ok(request_id)
    }

    /// Compensating path: the customer pulls the provider's still-`logged`
    /// additional entries into a request on the provider's behalf.
    pub async fn customer_initiate_approval(
        &self,
        order_id: &OrderId,
        message: Option<String>,
    ) -> Result<RequestId, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let eligible: Vec<EntryId> = tracking
            .entries
            .iter()
            .filter(|e| {
                e.status == EntryStatus::Logged && e.category == EntryCategory::Additional
            })
            .map(|e| e.id.clone())
            .collect();
        if eligible.is_empty() {
            return Err(TrackingError::NothingToSubmit);
        }

        let request_id = self.open_request(&mut tracking, eligible, message, true);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, request_id = %request_id, "customer initiated approval");
        Ok(request_id)
    }

    fn open_request(
        &self,
        tracking: &mut OrderTimeTracking,
        entry_ids: Vec<EntryId>,
        message: Option<String>,
        customer_initiated: bool,
    ) -> RequestId {
        let now = OffsetDateTime::now_utc();

        let total_hours: f64 = entry_ids
            .iter()
            .filter_map(|id| tracking.entry(id))
            .map(|e| e.hours)
            .sum();
        let total_amount: i64 = entry_ids
            .iter()
            .filter_map(|id| tracking.entry(id))
            .filter_map(|e| e.billable_amount)
            .sum();

        let request_id = tracking.next_request_id();
        for id in &entry_ids {
            if let Some(entry) = tracking.entry_mut(id) {
                entry.status = EntryStatus::Submitted;
                entry.submitted_at = Some(now);
            }
        }

        tracking.approval_requests.push(CustomerApprovalRequest {
            id: request_id.clone(),
            entry_ids,
            total_hours,
            total_amount,
            status: ApprovalStatus::Pending,
            provider_message: message,
            customer_feedback: None,
            approved_entry_ids: None,
            customer_initiated,
            submitted_at: now,
            customer_response_at: None,
        });

        tracking.status = TrackingStatus::SubmittedForApproval;
        tracking.recompute_totals();
        tracking.touch(now);
        request_id
    }

    /// Apply the customer's decision to a pending request.
    ///
    /// For `partially_approved` the approved set must be a non-empty subset
    /// of the request's entries; the subset is approved and the rest
    /// rejected. Re-processing a resolved request fails with
    /// `AlreadyResolved`.
    pub async fn process_customer_approval(
        &self,
        order_id: &OrderId,
        request_id: &RequestId,
        decision: ApprovalDecision,
        approved_entry_ids: Option<Vec<EntryId>>,
        feedback: Option<String>,
    ) -> Result<(), TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let request = tracking
            .request(request_id)
            .ok_or_else(|| TrackingError::RequestNotFound(request_id.clone()))?;
        if request.is_resolved() {
            return Err(TrackingError::AlreadyResolved(request_id.clone()));
        }
        let request_entries = request.entry_ids.clone();

        let approved_set = match decision {
            ApprovalDecision::PartiallyApproved => {
                let approved = approved_entry_ids.unwrap_or_default();
                if approved.is_empty() {
                    return Err(TrackingError::InvalidInput(
                        "partial approval requires a non-empty approved set".into(),
                    ));
                }
                if let Some(stray) = approved.iter().find(|id| !request_entries.contains(id)) {
                    return Err(TrackingError::InvalidInput(format!(
                        "entry {} is not part of request {}",
                        stray, request_id
                    )));
                }
                Some(approved)
            }
            _ => None,
        };

        let now = OffsetDateTime::now_utc();
        for id in &request_entries {
            let approved = match decision {
                ApprovalDecision::Approved => true,
                ApprovalDecision::Rejected => false,
                ApprovalDecision::PartiallyApproved => {
                    approved_set.as_ref().is_some_and(|set| set.contains(id))
                }
            };
            if let Some(entry) = tracking.entry_mut(id) {
                entry.status = if approved {
                    EntryStatus::CustomerApproved
                } else {
                    EntryStatus::CustomerRejected
                };
                entry.customer_response_at = Some(now);
            }
        }

        let request = tracking
            .request_mut(request_id)
            .expect("request existed above");
        request.status = match decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
            ApprovalDecision::PartiallyApproved => ApprovalStatus::PartiallyApproved,
        };
        request.customer_feedback = feedback;
        request.approved_entry_ids = approved_set;
        request.customer_response_at = Some(now);

        tracking.status = match decision {
            ApprovalDecision::Approved => TrackingStatus::FullyApproved,
            // A full rejection puts the order back to active work.
            ApprovalDecision::Rejected => TrackingStatus::Active,
            ApprovalDecision::PartiallyApproved => TrackingStatus::PartiallyApproved,
        };
        tracking.recompute_totals();
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(
            order_id = %order_id,
            request_id = %request_id,
            decision = ?decision,
            "processed customer approval"
        );
        Ok(())
    }

    /// "Accept everything and close out": approve every `submitted` entry
    /// and every `pending` request, then mark the order completed.
    ///
    /// Entries the customer already rejected individually stay rejected.
    pub async fn approve_complete_order(
        &self,
        order_id: &OrderId,
        feedback: Option<String>,
    ) -> Result<(), TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let now = OffsetDateTime::now_utc();
        for entry in &mut tracking.entries {
            if entry.status == EntryStatus::Submitted {
                entry.status = EntryStatus::CustomerApproved;
                entry.customer_response_at = Some(now);
            }
        }
        for request in &mut tracking.approval_requests {
            if request.status == ApprovalStatus::Pending {
                request.status = ApprovalStatus::Approved;
                request.customer_feedback = feedback.clone();
                request.customer_response_at = Some(now);
            }
        }

        tracking.status = TrackingStatus::Completed;
        tracking.recompute_totals();
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, "approved and completed order");
        Ok(())
    }
}
