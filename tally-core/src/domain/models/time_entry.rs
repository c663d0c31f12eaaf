use serde::{Deserialize, Serialize};
use strum::Display;
use time::{Date, OffsetDateTime};

use super::{EntryId, EscrowId};

/// Whether an entry falls inside the originally contracted scope or bills
/// on top of it. Only `additional` entries carry a billable amount; original
/// hours are pre-paid with the order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryCategory {
    Original,
    Additional,
}

/// Per-entry lifecycle:
/// `logged → submitted → {customer_approved | customer_rejected} →
/// escrow_pending → billed → released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryStatus {
    Logged,
    Submitted,
    CustomerApproved,
    CustomerRejected,
    EscrowPending,
    Billed,
    Released,
}

impl EntryStatus {
    /// Only freshly logged entries may be edited or deleted.
    pub fn is_editable(&self) -> bool {
        matches!(self, EntryStatus::Logged)
    }

    /// Approved hours stay approved as they travel through settlement.
    pub fn counts_as_approved(&self) -> bool {
        matches!(
            self,
            EntryStatus::CustomerApproved
                | EntryStatus::EscrowPending
                | EntryStatus::Billed
                | EntryStatus::Released
        )
    }

    pub fn counts_as_billed(&self) -> bool {
        matches!(self, EntryStatus::Billed | EntryStatus::Released)
    }
}

/// One logged work interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: EntryId,
    pub date: Date,
    /// Wall-clock bounds as entered by the provider (HH:MM).
    pub start_time: String,
    pub end_time: Option<String>,
    pub hours: f64,
    pub description: String,
    pub category: EntryCategory,
    pub is_break_time: bool,
    pub break_minutes: u32,
    pub travel_minutes: u32,
    /// Travel cost in minor currency units.
    pub travel_cost: i64,
    /// Present iff `category` is `additional`.
    pub billable_amount: Option<i64>,
    pub status: EntryStatus,
    pub escrow_id: Option<EscrowId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub customer_response_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub billed_at: Option<OffsetDateTime>,
}

impl TimeEntry {
    /// Billable amount for `hours` at `rate` minor units per hour, plus
    /// travel cost. Rounded to the nearest minor unit.
    pub fn billable_amount_for(hours: f64, rate: i64, travel_cost: i64) -> i64 {
        (hours * rate as f64).round() as i64 + travel_cost
    }

    /// Recompute `billable_amount` after `hours`, `travel_cost` or the
    /// category changed. Original entries never carry an amount.
    pub fn recompute_billable(&mut self, rate: i64) {
        self.billable_amount = match self.category {
            EntryCategory::Additional => {
                Some(Self::billable_amount_for(self.hours, rate, self.travel_cost))
            }
            EntryCategory::Original => None,
        };
    }
}

/// A not-yet-persisted time entry as supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub date: Date,
    pub start_time: String,
    pub end_time: Option<String>,
    pub hours: f64,
    pub description: String,
    pub category: EntryCategory,
    pub is_break_time: bool,
    pub break_minutes: u32,
    pub travel_minutes: u32,
    pub travel_cost: i64,
    /// Manual hourly rate, only consulted when neither the order nor the
    /// provider profile resolves one.
    pub rate_override: Option<i64>,
}

impl NewTimeEntry {
    pub fn new(
        date: Date,
        start_time: impl Into<String>,
        hours: f64,
        description: impl Into<String>,
        category: EntryCategory,
    ) -> Self {
        Self {
            date,
            start_time: start_time.into(),
            end_time: None,
            hours,
            description: description.into(),
            category,
            is_break_time: false,
            break_minutes: 0,
            travel_minutes: 0,
            travel_cost: 0,
            rate_override: None,
        }
    }

    pub fn with_end_time(mut self, end_time: impl Into<String>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    pub fn with_break(mut self, minutes: u32) -> Self {
        self.is_break_time = true;
        self.break_minutes = minutes;
        self
    }

    pub fn with_travel(mut self, minutes: u32, cost: i64) -> Self {
        self.travel_minutes = minutes;
        self.travel_cost = cost;
        self
    }

    pub fn with_rate_override(mut self, rate: i64) -> Self {
        self.rate_override = Some(rate);
        self
    }

    pub(crate) fn into_entry(self, id: EntryId, rate: i64, now: OffsetDateTime) -> TimeEntry {
        let billable_amount = match self.category {
            EntryCategory::Additional => Some(TimeEntry::billable_amount_for(
                self.hours,
                rate,
                self.travel_cost,
            )),
            EntryCategory::Original => None,
        };

        TimeEntry {
            id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            hours: self.hours,
            description: self.description,
            category: self.category,
            is_break_time: self.is_break_time,
            break_minutes: self.break_minutes,
            travel_minutes: self.travel_minutes,
            travel_cost: self.travel_cost,
            billable_amount,
            status: EntryStatus::Logged,
            escrow_id: None,
            created_at: now,
            submitted_at: None,
            customer_response_at: None,
            billed_at: None,
        }
    }
}

/// Partial update for a still-`logged` entry. Absent fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct TimeEntryPatch {
    pub date: Option<Date>,
    pub start_time: Option<String>,
    pub end_time: Option<Option<String>>,
    pub hours: Option<f64>,
    pub description: Option<String>,
    pub travel_minutes: Option<u32>,
    pub travel_cost: Option<i64>,
}

impl TimeEntryPatch {
    pub fn hours(hours: f64) -> Self {
        Self {
            hours: Some(hours),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, entry: &mut TimeEntry, rate: i64) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(start_time) = self.start_time {
            entry.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            entry.end_time = end_time;
        }
        if let Some(hours) = self.hours {
            entry.hours = hours;
        }
        if let Some(description) = self.description {
            entry.description = description;
        }
        if let Some(travel_minutes) = self.travel_minutes {
            entry.travel_minutes = travel_minutes;
        }
        if let Some(travel_cost) = self.travel_cost {
            entry.travel_cost = travel_cost;
        }
        entry.recompute_billable(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn draft(hours: f64, category: EntryCategory) -> NewTimeEntry {
        NewTimeEntry::new(date!(2025 - 11 - 03), "09:00", hours, "cabling", category)
    }

    #[test]
    fn additional_entry_carries_billable_amount() {
        let entry = draft(2.5, EntryCategory::Additional)
            .with_travel(30, 500)
            .into_entry(EntryId::from("entry-1"), 4000, OffsetDateTime::UNIX_EPOCH);

        assert_eq!(entry.billable_amount, Some(10_500));
    }

    #[test]
    fn original_entry_never_carries_billable_amount() {
        let entry = draft(8.0, EntryCategory::Original)
            .with_travel(30, 500)
            .into_entry(EntryId::from("entry-1"), 4000, OffsetDateTime::UNIX_EPOCH);

        assert_eq!(entry.billable_amount, None);
    }

    #[test]
    fn patching_hours_recomputes_billable_amount() {
        let mut entry = draft(2.0, EntryCategory::Additional).into_entry(
            EntryId::from("entry-1"),
            4000,
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(entry.billable_amount, Some(8_000));

        TimeEntryPatch::hours(3.0).apply(&mut entry, 4000);
        assert_eq!(entry.hours, 3.0);
        assert_eq!(entry.billable_amount, Some(12_000));
    }

    #[test]
    fn only_logged_is_editable() {
        assert!(EntryStatus::Logged.is_editable());
        for status in [
            EntryStatus::Submitted,
            EntryStatus::CustomerApproved,
            EntryStatus::CustomerRejected,
            EntryStatus::EscrowPending,
            EntryStatus::Billed,
            EntryStatus::Released,
        ] {
            assert!(!status.is_editable(), "{status} must not be editable");
        }
    }
}
