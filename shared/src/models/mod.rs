//! Data models
//!
//! Reservation and table-occupancy types shared between the booking engine
//! and its callers. All IDs are `i64`.

pub mod reservation;
pub mod table;

// Re-exports
pub use reservation::*;
pub use table::*;
