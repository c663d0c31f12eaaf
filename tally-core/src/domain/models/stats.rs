use serde::Serialize;

/// Dashboard rollup over all orders of one provider or customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyStats {
    pub total_orders: usize,
    /// Orders not yet in a terminal state.
    pub active_orders: usize,
    pub total_logged_hours: f64,
    pub total_approved_hours: f64,
    pub total_billed_hours: f64,
    /// Provider share of escrows currently held, minor units.
    pub pending_payout_amount: i64,
    /// Provider share of escrows already released, minor units.
    pub released_payout_amount: i64,
}
