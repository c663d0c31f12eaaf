mod escrow;
mod ids;
mod stats;
mod time_entry;
mod tracking;

pub use escrow::*;
pub use ids::*;
pub use stats::*;
pub use time_entry::*;
pub use tracking::*;
