//! Time-entry and escrow settlement engine for order-based marketplace work.
//!
//! Providers log work intervals against an order, submit them for customer
//! approval, and settle approved additional hours through an escrow-style
//! hold/release flow with a platform fee split. Persistence, payments and
//! rate lookup are reached through outbound ports; see [`domain::ports`].

pub mod adapters;
pub mod config;
pub mod domain;
