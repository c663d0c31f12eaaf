mod escrow_gateway;
mod rate_source;
mod tracking_store;

pub use escrow_gateway::*;
pub use rate_source::*;
pub use tracking_store::*;
