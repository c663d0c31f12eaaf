mod client;
mod escrow_url;

pub mod domain;

pub use client::*;
pub use escrow_url::*;
