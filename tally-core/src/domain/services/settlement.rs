use std::sync::Arc;

use itertools::Itertools;
use time::{Duration, OffsetDateTime};

use crate::config::SettlementSettings;
use crate::domain::{
    models::{
        EntryCategory, EntryId, EntryStatus, EscrowHold, EscrowId, EscrowStatus, OrderId,
        TrackingStatus,
    },
    ports::outbound::{EscrowGateway, HoldRequest, TrackingStore},
    TrackingError,
};

/// Escrow settlement: converts approved additional hours into a funds hold,
/// tracks the hold through paid and released, and owns the platform fee
/// split.
///
/// External calls happen strictly before the local commit, keyed so a
/// retried operation reuses the provider-side result instead of charging or
/// paying out twice.
pub struct SettlementService<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    settings: SettlementSettings,
}

impl<S, G> Clone for SettlementService<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S, G> SettlementService<S, G> {
    pub fn new(store: Arc<S>, gateway: Arc<G>, settings: SettlementSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }
}

/// Platform fee in minor units, rounded half up.
pub fn platform_fee(amount: i64, fee_bps: u32) -> i64 {
    ((amount as i128 * fee_bps as i128 + 5_000) / 10_000) as i64
}

impl<S: TrackingStore, G: EscrowGateway> SettlementService<S, G> {
    /// Authorize a hold over every approved additional entry not yet
    /// covered by an escrow.
    ///
    /// With nothing billable the call returns `NothingApproved` without
    /// touching the payment API. An immediate second call lands here too,
    /// since the first one moved the covered entries out of
    /// `customer_approved`.
    pub async fn create_escrow(&self, order_id: &OrderId) -> Result<EscrowId, TrackingError> {
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
                e.category == EntryCategory::Additional
                    && e.status == EntryStatus::CustomerApproved
                    && !tracking.escrowed(&e.id)
            })
            .map(|e| e.id.clone())
            .collect();

        let total: i64 = eligible
            .iter()
            .filter_map(|id| tracking.entry(id))
            .filter_map(|e| e.billable_amount)
            .sum();
        if eligible.is_empty() || total <= 0 {
            return Err(TrackingError::NothingApproved);
        }

        if let Some(hold) = &tracking.escrow {
            if hold.status != EscrowStatus::Released {
                return Err(TrackingError::StatusConflict(format!(
                    "escrow {} is still {} on this order",
                    hold.escrow_id, hold.status
                )));
            }
        }

        let platform_fee_amount = platform_fee(total, self.settings.platform_fee_bps);
        let request = HoldRequest {
            order_id: order_id.clone(),
            customer_id: tracking.customer_id.clone(),
            provider_id: tracking.provider_id.clone(),
            amount: total,
            currency: self.settings.currency.clone(),
            clearing_days: self.settings.clearing_days,
            idempotency_key: authorize_key(order_id, &eligible),
        };

        // The hold is authorized first; local state is committed only once
        // the provider has answered. A commit conflict after a successful
        // authorize is safe to retry, the idempotency key pins the hold.
        let escrow_id = self.gateway.authorize(&request).await?;

        let now = OffsetDateTime::now_utc();
        for id in &eligible {
            if let Some(entry) = tracking.entry_mut(id) {
                entry.status = EntryStatus::EscrowPending;
                entry.escrow_id = Some(escrow_id.clone());
            }
        }
        tracking.escrow = Some(EscrowHold {
            escrow_id: escrow_id.clone(),
            amount: total,
            currency: self.settings.currency.clone(),
            platform_fee_amount,
            provider_amount: total - platform_fee_amount,
            status: EscrowStatus::Authorized,
            entry_ids: eligible,
            clearing_days: self.settings.clearing_days,
            authorized_at: now,
            clearing_ends_at: Some(now + Duration::days(self.settings.clearing_days as i64)),
            held_at: None,
            released_at: None,
        });
        tracking.recompute_totals();
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(
            order_id = %order_id,
            escrow_id = %escrow_id,
            amount = total,
            fee = platform_fee_amount,
            "authorized escrow hold"
        );
        Ok(escrow_id)
    }

    /// Record that the customer's payment landed: covered entries become
    /// `billed`, the escrow becomes `held`. Purely a local transition; the
    /// payment system is the source of truth for "paid".
    pub async fn mark_escrow_paid(
        &self,
        order_id: &OrderId,
        escrow_id: &EscrowId,
    ) -> Result<(), TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let hold = tracking
            .escrow
            .as_mut()
            .filter(|hold| &hold.escrow_id == escrow_id)
            .ok_or_else(|| TrackingError::EscrowNotFound(escrow_id.clone()))?;
        if hold.status != EscrowStatus::Authorized {
            return Err(TrackingError::StatusConflict(format!(
                "escrow {} is {} and cannot be marked paid",
                escrow_id, hold.status
            )));
        }

        let now = OffsetDateTime::now_utc();
        hold.status = EscrowStatus::Held;
        hold.held_at = Some(now);
        let covered = hold.entry_ids.clone();
        for id in &covered {
            if let Some(entry) = tracking.entry_mut(id) {
                entry.status = EntryStatus::Billed;
                entry.billed_at = Some(now);
            }
        }
        tracking.recompute_totals();
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, escrow_id = %escrow_id, "escrow marked paid");
        Ok(())
    }

    /// Release the held funds to the provider.
    ///
    /// A second call on an already-released escrow reports
    /// `AlreadyReleased` without reaching the payment API. Returns the
    /// provider's share.
    pub async fn release_escrow(&self, order_id: &OrderId) -> Result<i64, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let hold = tracking
            .escrow
            .as_ref()
            .ok_or_else(|| TrackingError::StatusConflict("order has no escrow hold".into()))?;
        match hold.status {
            EscrowStatus::Released => {
                return Err(TrackingError::AlreadyReleased(hold.escrow_id.clone()))
            }
            EscrowStatus::Authorized => {
                return Err(TrackingError::StatusConflict(format!(
                    "escrow {} is not held yet",
                    hold.escrow_id
                )))
            }
            EscrowStatus::Held => {}
        }
        let escrow_id = hold.escrow_id.clone();

        self.gateway
            .release(&escrow_id, &release_key(&escrow_id))
            .await?;

        let now = OffsetDateTime::now_utc();
        let hold = tracking.escrow.as_mut().expect("checked above");
        hold.status = EscrowStatus::Released;
        hold.released_at = Some(now);
        let provider_amount = hold.provider_amount;
        let covered = hold.entry_ids.clone();
        for id in &covered {
            if let Some(entry) = tracking.entry_mut(id) {
                entry.status = EntryStatus::Released;
            }
        }
        tracking.status = TrackingStatus::Completed;
        tracking.recompute_totals();
        tracking.touch(now);

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(
            order_id = %order_id,
            escrow_id = %escrow_id,
            provider_amount,
            "released escrow to provider"
        );
        Ok(provider_amount)
    }
}

fn authorize_key(order_id: &OrderId, entry_ids: &[EntryId]) -> String {
    let entries = entry_ids.iter().map(|id| id.as_str()).join("+");
    format!("{}:authorize:{}", order_id, entries)
}

fn release_key(escrow_id: &EscrowId) -> String {
    format!("{}:release", escrow_id)
}
