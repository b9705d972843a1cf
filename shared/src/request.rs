//! Canonical request payloads
//!
//! Callers hash these (not the raw HTTP body) to compute the idempotency
//! request hash, so field order and naming are part of the contract.

use serde::{Deserialize, Serialize};

/// Hold request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldPayload {
    pub table_id: i64,
    pub event_id: i64,
    pub guest_count: i32,
}

/// Confirm request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayload {
    pub booking_id: i64,
}

/// Plus-one request body; `op` is always `"plus-one"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlusOnePayload {
    pub booking_id: i64,
    pub op: String,
}

impl PlusOnePayload {
    pub const OP: &'static str = "plus-one";

    pub fn new(booking_id: i64) -> Self {
        Self {
            booking_id,
            op: Self::OP.to_string(),
        }
    }
}
