use super::*;
use crate::core::ManualClock;
use crate::layout::InMemoryLayout;
use crate::request_hash::hash_request_canonical;
use async_trait::async_trait;
use chrono::{Duration, TimeZone};
use shared::request::{ConfirmPayload, HoldPayload, PlusOnePayload};

mod test_hold;
mod test_reclaim;

const VENUE: i64 = 1;
const OTHER_VENUE: i64 = 2;
const EVENT: i64 = 55;
const GUEST: i64 = 100;
const OTHER_GUEST: i64 = 200;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
}

fn event_start() -> DateTime<Utc> {
    t0() + Duration::hours(4)
}

struct Harness {
    engine: BookingEngine,
    clock: Arc<ManualClock>,
    layout: Arc<InMemoryLayout>,
}

fn create_test_engine() -> Harness {
    create_test_engine_with(BookingConfig::defaults())
}

/// Tables 1-4 seat four, table 5 seats two; one event at `event_start()`.
fn create_test_engine_with(config: BookingConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let layout = Arc::new(InMemoryLayout::new());
    for table_id in 1..=4 {
        layout.upsert_table(VENUE, table_id, 4);
    }
    layout.upsert_table(VENUE, 5, 2);
    layout.upsert_event(VENUE, EVENT, event_start());

    let engine = BookingEngine::new(config, clock.clone(), layout.clone());
    Harness {
        engine,
        clock,
        layout,
    }
}

// ========================================================================
// Request builders
// ========================================================================

fn hold_req(requester_id: i64, table_id: i64, guest_count: i32, key: &str) -> HoldRequest {
    let payload = HoldPayload {
        table_id,
        event_id: EVENT,
        guest_count,
    };
    HoldRequest {
        requester_id,
        venue_id: VENUE,
        table_id,
        event_id: EVENT,
        guest_count,
        idempotency_key: key.to_string(),
        request_hash: hash_request_canonical(&payload).unwrap(),
    }
}

fn confirm_req(requester_id: i64, venue_id: i64, booking_id: i64, key: &str) -> ConfirmRequest {
    ConfirmRequest {
        requester_id,
        venue_id,
        reservation_id: booking_id,
        idempotency_key: key.to_string(),
        request_hash: hash_request_canonical(&ConfirmPayload { booking_id }).unwrap(),
    }
}

fn plus_one_req(requester_id: i64, booking_id: i64, key: &str) -> PlusOneRequest {
    PlusOneRequest {
        requester_id,
        reservation_id: booking_id,
        idempotency_key: key.to_string(),
        request_hash: hash_request_canonical(&PlusOnePayload::new(booking_id)).unwrap(),
    }
}

// ========================================================================
// Helper: reservations in a given state
// ========================================================================

async fn held(h: &Harness, table_id: i64, guest_count: i32) -> Reservation {
    let key = format!("hold-{}-{}", table_id, h.engine.now().timestamp());
    let outcome = h
        .engine
        .hold(hold_req(GUEST, table_id, guest_count, &key))
        .await
        .expect("hold should succeed");
    assert_eq!(outcome.reservation.status, ReservationStatus::Held);
    outcome.reservation
}

async fn confirmed(h: &Harness, table_id: i64, guest_count: i32) -> Reservation {
    let reservation = held(h, table_id, guest_count).await;
    let outcome = h
        .engine
        .confirm(confirm_req(
            GUEST,
            VENUE,
            reservation.id,
            &format!("confirm-{}", reservation.id),
        ))
        .await
        .expect("confirm should succeed");
    assert_eq!(outcome.reservation.status, ReservationStatus::Confirmed);
    outcome.reservation
}

/// Layout whose backing service is down
struct FailingLayout;

#[async_trait]
impl LayoutLookup for FailingLayout {
    async fn table_capacity(
        &self,
        _venue_id: i64,
        _event_id: i64,
        _table_id: i64,
    ) -> anyhow::Result<Option<i32>> {
        Err(anyhow::anyhow!("layout service unavailable"))
    }

    async fn event_start(
        &self,
        _venue_id: i64,
        _event_id: i64,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        Err(anyhow::anyhow!("layout service unavailable"))
    }
}
