//! Shared types for the table booking workspace
//!
//! Plain data used by the booking engine and by whatever transport layer
//! embeds it: error codes, the unified error/response types, reservation
//! and table models, and the canonical request payloads that are hashed
//! for idempotency checks.

pub mod error;
pub mod models;
pub mod request;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{
    ArrivalWindow, Reservation, ReservationId, ReservationStatus, ReservationView, TableStatus,
};
pub use request::{ConfirmPayload, HoldPayload, PlusOnePayload};
