//! Reservation Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reservation identifier, allocated monotonically starting at 1
pub type ReservationId = i64;

/// Reservation lifecycle status
///
/// Only `Held -> Confirmed` and `Held -> Canceled` (hold expiry) exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    Canceled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "HELD",
            Self::Confirmed => "CONFIRMED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arrival window around the event start (到店时间窗口)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Reservation entity (预订)
///
/// Records are immutable snapshots; the engine replaces them wholesale
/// under per-key atomicity instead of mutating fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub requester_id: i64,
    pub venue_id: i64,
    pub table_id: i64,
    pub event_id: i64,
    pub status: ReservationStatus,
    pub guest_count: i32,
    pub arrival_window: ArrivalWindow,
    pub plus_one_deadline: Option<DateTime<Utc>>,
    pub plus_one_used: bool,
    pub capacity_at_hold: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only while `Held`
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// A hold is expired once its expiry lies strictly before `now`.
    pub fn is_hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.hold_expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Later of the last update and the end of the arrival window; retention
    /// is measured from this instant.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.updated_at.max(self.arrival_window.end)
    }

    pub fn plus_one_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.plus_one_deadline.is_some_and(|deadline| now > deadline)
    }

    pub fn to_view(&self) -> ReservationView {
        ReservationView::from(self)
    }
}

/// Response snapshot returned to callers and cached for idempotent replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationView {
    pub id: ReservationId,
    pub venue_id: i64,
    pub table_id: i64,
    pub event_id: i64,
    pub status: ReservationStatus,
    pub guest_count: i32,
    /// `[start, end]`
    pub arrival_window: [DateTime<Utc>; 2],
    pub plus_one_deadline: Option<DateTime<Utc>>,
    pub plus_one_used: bool,
    pub capacity_at_hold: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationView {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            venue_id: r.venue_id,
            table_id: r.table_id,
            event_id: r.event_id,
            status: r.status,
            guest_count: r.guest_count,
            arrival_window: [r.arrival_window.start, r.arrival_window.end],
            plus_one_deadline: r.plus_one_deadline,
            plus_one_used: r.plus_one_used,
            capacity_at_hold: r.capacity_at_hold,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
