use std::sync::Arc;

use time::OffsetDateTime;

use crate::domain::{
    models::{
        EntryCategory, EntryId, NewTimeEntry, OrderContext, OrderId, OrderTimeTracking, TimeEntry,
        TimeEntryPatch,
    },
    ports::outbound::{RateSource, TrackingStore},
    TrackingError,
};

/// The time-entry ledger: owns the per-order entry collection, entry status
/// transitions out of `logged`, and billable amount computation.
///
/// Every mutation is a read-modify-write against the tracking document,
/// committed through the store's revision compare-and-swap.
pub struct LedgerService<S, R> {
    store: Arc<S>,
    rates: Arc<R>,
}

impl<S, R> LedgerService<S, R> {
    pub fn new(store: Arc<S>, rates: Arc<R>) -> Self {
        Self { store, rates }
    }
}

impl<S: TrackingStore, R: RateSource> LedgerService<S, R> {
    /// Eagerly initialize tracking for an order, snapshotting the agreed
    /// hourly rate and planned hours.
    pub async fn initialize_tracking(
        &self,
        ctx: &OrderContext,
        original_planned_hours: f64,
        hourly_rate: i64,
    ) -> Result<(), TrackingError> {
        if original_planned_hours < 0.0 {
            return Err(TrackingError::InvalidInput(
                "planned hours must not be negative".into(),
            ));
        }
        if hourly_rate <= 0 {
            return Err(TrackingError::InvalidInput(
                "hourly rate must be positive".into(),
            ));
        }

        if self.store.get(&ctx.order_id).await?.is_some() {
            return Err(TrackingError::StatusConflict(format!(
                "time tracking already initialized for order {}",
                ctx.order_id
            )));
        }

        let tracking = OrderTimeTracking::new(
            ctx,
            hourly_rate,
            original_planned_hours,
            OffsetDateTime::now_utc(),
        );
        self.store.create(&tracking).await?;

        tracing::info!(order_id = %ctx.order_id, hourly_rate, "initialized time tracking");
        Ok(())
    }

    /// Append one entry to the order's ledger and return its id.
    ///
    /// Lazily initializes the tracking record on first use, resolving the
    /// hourly rate from (in order) the already-initialized order, the
    /// provider's profile, or an explicit override on the draft. With none
    /// of the three the call fails closed with `RateUnresolved`.
    pub async fn log_time_entry(
        &self,
        ctx: &OrderContext,
        draft: NewTimeEntry,
    ) -> Result<EntryId, TrackingError> {
        validate_draft(&draft)?;
        let ids = self.append_entries(ctx, vec![draft]).await?;
        Ok(ids.into_iter().next().expect("one draft in, one id out"))
    }

    /// Log a worked interval, classifying it against the order's planned
    /// hours: time that fits the remaining planned budget is recorded as
    /// `original`, overflow as `additional`. An interval straddling the
    /// boundary is split into two entries, committed atomically. The
    /// draft's own category is ignored.
    pub async fn log_worked_interval(
        &self,
        ctx: &OrderContext,
        draft: NewTimeEntry,
    ) -> Result<Vec<EntryId>, TrackingError> {
        validate_draft(&draft)?;

        let remaining = match self.store.get(&ctx.order_id).await? {
            Some(versioned) => versioned.tracking.remaining_original_hours(),
            None => 0.0,
        };

        let drafts = split_by_planned_hours(draft, remaining);
        self.append_entries(ctx, drafts).await
    }

    async fn append_entries(
        &self,
        ctx: &OrderContext,
        drafts: Vec<NewTimeEntry>,
    ) -> Result<Vec<EntryId>, TrackingError> {
        let now = OffsetDateTime::now_utc();

        let (mut tracking, revision) = match self.store.get(&ctx.order_id).await? {
            Some(versioned) => (versioned.tracking, Some(versioned.revision)),
            None => {
                let rate = self.resolve_rate(ctx, &drafts).await?;
                (OrderTimeTracking::new(ctx, rate, 0.0, now), None)
            }
        };

        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = tracking.next_entry_id();
            let entry = draft.into_entry(id.clone(), tracking.hourly_rate, now);
            tracing::info!(
                order_id = %ctx.order_id,
                entry_id = %id,
                hours = entry.hours,
                category = %entry.category,
                "logged time entry"
            );
            tracking.entries.push(entry);
            ids.push(id);
        }
        tracking.recompute_totals();
        tracking.touch(now);

        match revision {
            Some(revision) => {
                self.store
                    .update(&ctx.order_id, revision, &tracking)
                    .await?;
            }
            None => {
                self.store.create(&tracking).await?;
            }
        }
        Ok(ids)
    }

    /// Rate resolution for a lazily created tracking record. The order has
    /// no snapshotted rate yet, so consult the provider profile, then any
    /// explicit override; refuse to log otherwise.
    async fn resolve_rate(
        &self,
        ctx: &OrderContext,
        drafts: &[NewTimeEntry],
    ) -> Result<i64, TrackingError> {
        if let Some(rate) = self.rates.hourly_rate(&ctx.provider_id).await? {
            return Ok(rate);
        }
        if let Some(rate) = drafts.iter().find_map(|d| d.rate_override) {
            return Ok(rate);
        }
        Err(TrackingError::RateUnresolved(ctx.provider_id.clone()))
    }

    /// Patch a still-`logged` entry. Changing hours or travel cost on an
    /// `additional` entry recomputes its billable amount.
    pub async fn update_time_entry(
        &self,
        order_id: &OrderId,
        entry_id: &EntryId,
        patch: TimeEntryPatch,
    ) -> Result<(), TrackingError> {
        if let Some(hours) = patch.hours {
            if hours <= 0.0 {
                return Err(TrackingError::InvalidInput("hours must be positive".into()));
            }
        }
        if let Some(travel_cost) = patch.travel_cost {
            if travel_cost < 0 {
                return Err(TrackingError::InvalidInput(
                    "travel cost must not be negative".into(),
                ));
            }
        }

        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;
        let rate = tracking.hourly_rate;

        let entry = tracking
            .entry_mut(entry_id)
            .ok_or_else(|| TrackingError::EntryNotFound(entry_id.clone()))?;
        if !entry.status.is_editable() {
            return Err(TrackingError::StatusConflict(format!(
                "entry {} is {} and can no longer be edited",
                entry_id, entry.status
            )));
        }

        patch.apply(entry, rate);
        tracking.recompute_totals();
        tracking.touch(OffsetDateTime::now_utc());

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;
        Ok(())
    }

    /// Remove a still-`logged` entry from the ledger.
    pub async fn delete_time_entry(
        &self,
        order_id: &OrderId,
        entry_id: &EntryId,
    ) -> Result<(), TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;
        let mut tracking = versioned.tracking;

        let entry = tracking
            .entry(entry_id)
            .ok_or_else(|| TrackingError::EntryNotFound(entry_id.clone()))?;
        if !entry.status.is_editable() {
            return Err(TrackingError::StatusConflict(format!(
                "entry {} is {} and can no longer be deleted",
                entry_id, entry.status
            )));
        }

        tracking.entries.retain(|e| &e.id != entry_id);
        tracking.recompute_totals();
        tracking.touch(OffsetDateTime::now_utc());

        self.store
            .update(order_id, versioned.revision, &tracking)
            .await?;

        tracing::info!(order_id = %order_id, entry_id = %entry_id, "deleted time entry");
        Ok(())
    }

    /// All entries of an order, newest first (date descending, then start
    /// time descending). Pure read.
    pub async fn entries_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TimeEntry>, TrackingError> {
        let versioned = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_id.clone()))?;

        let mut entries = versioned.tracking.entries;
        entries.sort_by(|a, b| {
            let date_cmp = b.date.cmp(&a.date);
            if date_cmp == std::cmp::Ordering::Equal {
                b.start_time.cmp(&a.start_time)
            } else {
                date_cmp
            }
        });
        Ok(entries)
    }
}

fn validate_draft(draft: &NewTimeEntry) -> Result<(), TrackingError> {
    if draft.hours <= 0.0 {
        return Err(TrackingError::InvalidInput("hours must be positive".into()));
    }
    if draft.travel_cost < 0 {
        return Err(TrackingError::InvalidInput(
            "travel cost must not be negative".into(),
        ));
    }
    Ok(())
}

/// Split a draft against the remaining planned-hours budget. Returns one or
/// two drafts with their categories set.
fn split_by_planned_hours(mut draft: NewTimeEntry, remaining: f64) -> Vec<NewTimeEntry> {
    if remaining >= draft.hours {
        draft.category = EntryCategory::Original;
        return vec![draft];
    }
    if remaining <= 0.0 {
        draft.category = EntryCategory::Additional;
        return vec![draft];
    }

    let mut original = draft.clone();
    original.category = EntryCategory::Original;
    original.hours = remaining;
    original.description = format!("{} (planned hours)", draft.description);
    // Travel cost bills once, on the additional part.
    original.travel_cost = 0;
    original.travel_minutes = 0;

    draft.category = EntryCategory::Additional;
    draft.hours -= remaining;
    draft.description = format!("{} (additional hours)", draft.description);

    vec![original, draft]
}
