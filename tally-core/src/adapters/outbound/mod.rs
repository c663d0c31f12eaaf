pub mod escrow;
pub mod memory;
pub mod postgres;
