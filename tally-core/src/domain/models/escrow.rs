use serde::{Deserialize, Serialize};
use strum::Display;
use time::OffsetDateTime;

use super::{EntryId, EscrowId};

/// Settlement state of a hold: authorized (funds reserved), held (customer
/// paid in, funds frozen at the platform) and released (paid out to the
/// provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscrowStatus {
    Authorized,
    Held,
    Released,
}

/// The funds hold covering an order's approved additional hours.
///
/// Each entry belongs to at most one escrow; the covered set is fixed when
/// the hold is authorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowHold {
    pub escrow_id: EscrowId,
    /// Total held amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub platform_fee_amount: i64,
    /// What the provider receives: `amount - platform_fee_amount`.
    pub provider_amount: i64,
    pub status: EscrowStatus,
    pub entry_ids: Vec<EntryId>,
    pub clearing_days: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub authorized_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub clearing_ends_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub held_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub released_at: Option<OffsetDateTime>,
}

impl EscrowHold {
    pub fn covers(&self, entry_id: &EntryId) -> bool {
        self.entry_ids.contains(entry_id)
    }
}
