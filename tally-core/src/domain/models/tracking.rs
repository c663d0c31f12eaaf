use serde::{Deserialize, Serialize};
use strum::Display;
use time::OffsetDateTime;

use super::{EntryCategory, EntryId, EscrowHold, OrderId, PartyId, RequestId, TimeEntry};

/// The order this engine invocation acts on, as resolved by the caller
/// (routing and authorization live outside the engine).
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub provider_id: PartyId,
}

impl OrderContext {
    pub fn new(
        order_id: impl Into<OrderId>,
        customer_id: impl Into<PartyId>,
        provider_id: impl Into<PartyId>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            provider_id: provider_id.into(),
        }
    }
}

/// Order-level workflow status, a rollup over pending requests and entry
/// states: `active → submitted_for_approval → {fully_approved |
/// partially_approved} → completed`. A fully rejected request returns the
/// order to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingStatus {
    Active,
    SubmittedForApproval,
    FullyApproved,
    PartiallyApproved,
    Completed,
}

/// Resolution state of a customer approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    PartiallyApproved,
}

/// A batch of entries awaiting (or past) the customer's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerApprovalRequest {
    pub id: RequestId,
    pub entry_ids: Vec<EntryId>,
    pub total_hours: f64,
    /// Sum of billable amounts over the included entries, minor units.
    pub total_amount: i64,
    pub status: ApprovalStatus,
    pub provider_message: Option<String>,
    pub customer_feedback: Option<String>,
    /// Only meaningful when `status` is `partially_approved`.
    pub approved_entry_ids: Option<Vec<EntryId>>,
    /// True when the customer pulled still-logged entries in on the
    /// provider's behalf.
    pub customer_initiated: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub customer_response_at: Option<OffsetDateTime>,
}

impl CustomerApprovalRequest {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.status, ApprovalStatus::Pending)
    }
}

/// Completion acknowledgements from both parties. `both_parties_complete`
/// is derived from the two timestamps, never stored on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub customer_marked_complete_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub provider_marked_complete_at: Option<OffsetDateTime>,
    pub customer_note: Option<String>,
    pub provider_note: Option<String>,
    /// Re-entrancy guard: set once a fund release has gone through so the
    /// coordinator never releases twice.
    pub escrow_release_initiated: bool,
}

impl CompletionStatus {
    pub fn both_parties_complete(&self) -> bool {
        self.customer_marked_complete_at.is_some() && self.provider_marked_complete_at.is_some()
    }
}

/// The per-order tracking document: the entry ledger, approval requests,
/// escrow hold and completion state, plus aggregate counters.
///
/// Persisted and replaced as a whole, guarded by the store's revision
/// counter (see `TrackingStore`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTimeTracking {
    pub order_id: OrderId,
    pub customer_id: PartyId,
    pub provider_id: PartyId,
    /// Hourly rate in minor units, snapshotted at initialization. Never
    /// re-read from the provider profile afterwards.
    pub hourly_rate: i64,
    pub original_planned_hours: f64,
    pub status: TrackingStatus,
    pub total_logged_hours: f64,
    pub total_approved_hours: f64,
    pub total_billed_hours: f64,
    pub entries: Vec<TimeEntry>,
    pub approval_requests: Vec<CustomerApprovalRequest>,
    pub escrow: Option<EscrowHold>,
    pub completion: CompletionStatus,
    /// Monotonic counter backing entry/request id generation.
    pub id_seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl OrderTimeTracking {
    pub fn new(
        ctx: &OrderContext,
        hourly_rate: i64,
        original_planned_hours: f64,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            order_id: ctx.order_id.clone(),
            customer_id: ctx.customer_id.clone(),
            provider_id: ctx.provider_id.clone(),
            hourly_rate,
            original_planned_hours,
            status: TrackingStatus::Active,
            total_logged_hours: 0.0,
            total_approved_hours: 0.0,
            total_billed_hours: 0.0,
            entries: Vec::new(),
            approval_requests: Vec::new(),
            escrow: None,
            completion: CompletionStatus::default(),
            id_seq: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn entry(&self, id: &EntryId) -> Option<&TimeEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn entry_mut(&mut self, id: &EntryId) -> Option<&mut TimeEntry> {
        self.entries.iter_mut().find(|e| &e.id == id)
    }

    pub fn request(&self, id: &RequestId) -> Option<&CustomerApprovalRequest> {
        self.approval_requests.iter().find(|r| &r.id == id)
    }

    pub fn request_mut(&mut self, id: &RequestId) -> Option<&mut CustomerApprovalRequest> {
        self.approval_requests.iter_mut().find(|r| &r.id == id)
    }

    pub fn next_entry_id(&mut self) -> EntryId {
        self.id_seq += 1;
        EntryId::new(format!("entry-{}", self.id_seq))
    }

    pub fn next_request_id(&mut self) -> RequestId {
        self.id_seq += 1;
        RequestId::new(format!("approval-{}", self.id_seq))
    }

    /// Planned hours not yet consumed by `original` entries.
    pub fn remaining_original_hours(&self) -> f64 {
        let logged_original: f64 = self
            .entries
            .iter()
            .filter(|e| e.category == EntryCategory::Original)
            .map(|e| e.hours)
            .sum();
        (self.original_planned_hours - logged_original).max(0.0)
    }

    /// True when the entry is already covered by the order's escrow.
    pub fn escrowed(&self, entry_id: &EntryId) -> bool {
        self.escrow.as_ref().is_some_and(|hold| hold.covers(entry_id))
    }

    /// Recompute the aggregate hour counters from the ledger. Called after
    /// every mutation so the totals never drift from the entries.
    pub fn recompute_totals(&mut self) {
        self.total_logged_hours = self.entries.iter().map(|e| e.hours).sum();
        self.total_approved_hours = self
            .entries
            .iter()
            .filter(|e| e.status.counts_as_approved())
            .map(|e| e.hours)
            .sum();
        self.total_billed_hours = self
            .entries
            .iter()
            .filter(|e| e.status.counts_as_billed())
            .map(|e| e.hours)
            .sum();
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EntryStatus, NewTimeEntry};
    use time::macros::date;

    fn tracking() -> OrderTimeTracking {
        let ctx = OrderContext::new("order-1", "cust-1", "prov-1");
        OrderTimeTracking::new(&ctx, 4000, 8.0, OffsetDateTime::UNIX_EPOCH)
    }

    fn push_entry(tracking: &mut OrderTimeTracking, hours: f64, category: EntryCategory) {
        let id = tracking.next_entry_id();
        let entry = NewTimeEntry::new(date!(2025 - 11 - 03), "09:00", hours, "work", category)
            .into_entry(id, tracking.hourly_rate, OffsetDateTime::UNIX_EPOCH);
        tracking.entries.push(entry);
        tracking.recompute_totals();
    }

    #[test]
    fn totals_follow_the_ledger() {
        let mut tracking = tracking();
        push_entry(&mut tracking, 3.0, EntryCategory::Original);
        push_entry(&mut tracking, 2.0, EntryCategory::Additional);

        assert_eq!(tracking.total_logged_hours, 5.0);
        assert_eq!(tracking.total_approved_hours, 0.0);

        tracking.entries[1].status = EntryStatus::CustomerApproved;
        tracking.recompute_totals();
        assert_eq!(tracking.total_approved_hours, 2.0);

        tracking.entries[1].status = EntryStatus::Billed;
        tracking.recompute_totals();
        assert_eq!(tracking.total_approved_hours, 2.0);
        assert_eq!(tracking.total_billed_hours, 2.0);
    }

    #[test]
    fn remaining_original_hours_never_negative() {
        let mut tracking = tracking();
        assert_eq!(tracking.remaining_original_hours(), 8.0);

        push_entry(&mut tracking, 6.0, EntryCategory::Original);
        assert_eq!(tracking.remaining_original_hours(), 2.0);

        push_entry(&mut tracking, 4.0, EntryCategory::Original);
        assert_eq!(tracking.remaining_original_hours(), 0.0);
    }

    #[test]
    fn completion_is_derived_from_both_timestamps() {
        let mut completion = CompletionStatus::default();
        assert!(!completion.both_parties_complete());

        completion.provider_marked_complete_at = Some(OffsetDateTime::UNIX_EPOCH);
        assert!(!completion.both_parties_complete());

        completion.customer_marked_complete_at = Some(OffsetDateTime::UNIX_EPOCH);
        assert!(completion.both_parties_complete());
    }
}
