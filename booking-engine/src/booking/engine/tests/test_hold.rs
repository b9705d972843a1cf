use super::*;

#[tokio::test]
async fn test_hold_creates_held_reservation() {
    let h = create_test_engine();

    let outcome = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();
    assert!(!outcome.cached);

    let r = &outcome.reservation;
    assert_eq!(r.id, 1);
    assert_eq!(r.status, ReservationStatus::Held);
    assert_eq!(r.guest_count, 2);
    assert_eq!(r.capacity_at_hold, Some(4));
    assert_eq!(r.hold_expires_at, Some(t0() + Duration::minutes(10)));
    assert_eq!(r.arrival_window.start, event_start() - Duration::minutes(15));
    assert_eq!(r.arrival_window.end, event_start() + Duration::minutes(45));
    assert_eq!(r.plus_one_deadline, Some(event_start() + Duration::minutes(30)));
    assert!(!r.plus_one_used);

    assert_eq!(h.engine.table_status(EVENT, 1), TableStatus::Held);
    assert_eq!(h.engine.last_updated_at(EVENT), Some(t0()));
    assert_eq!(h.engine.last_updated_at_table(EVENT, 1), Some(t0()));
    assert_eq!(h.engine.find_by_id(r.id).unwrap(), *r);
    assert_eq!(h.engine.venue_of(r.id), Some(VENUE));
}

#[tokio::test]
async fn test_hold_body_is_view_json() {
    let h = create_test_engine();
    let outcome = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();

    let parsed: ReservationView = serde_json::from_str(&outcome.body).unwrap();
    assert_eq!(parsed, outcome.view());
    assert!(!outcome.body.contains("requesterId"));

    let response = outcome.clone().into_response();
    assert_eq!(response.code, Some(0));
    assert_eq!(response.data, Some(outcome.view()));
}

#[tokio::test]
async fn test_hold_on_held_table_rejected() {
    let h = create_test_engine();
    held(&h, 1, 2).await;

    let err = h
        .engine
        .hold(hold_req(OTHER_GUEST, 1, 2, "k-other"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::TableNotAvailable {
            event_id: EVENT,
            table_id: 1
        }
    ));
    assert_eq!(h.engine.stats().reservations, 1);
}

#[tokio::test]
async fn test_hold_on_booked_table_rejected() {
    let h = create_test_engine();
    confirmed(&h, 1, 2).await;

    h.clock.advance(Duration::hours(1));
    let err = h
        .engine
        .hold(hold_req(OTHER_GUEST, 1, 2, "k-other"))
        .await
        .unwrap_err();
    assert_eq!(err.as_str(), "TABLE_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_expired_hold_frees_table_for_next_requester() {
    let h = create_test_engine();
    let first = held(&h, 1, 2).await;

    h.clock.advance(Duration::minutes(10) + Duration::seconds(1));
    let second = h
        .engine
        .hold(hold_req(OTHER_GUEST, 1, 3, "k-other"))
        .await
        .unwrap();
    assert_ne!(second.reservation.id, first.id);

    // the lapsed hold is only judged when its owner tries to confirm
    let lapsed = h.engine.find_by_id(first.id).unwrap();
    assert_eq!(lapsed.status, ReservationStatus::Held);
    assert!(lapsed.is_hold_expired(h.engine.now()));
    assert_eq!(h.engine.table_status(EVENT, 1), TableStatus::Held);
}

#[tokio::test]
async fn test_hold_validation() {
    let h = create_test_engine();

    let err = h.engine.hold(hold_req(GUEST, 1, 0, "k-1")).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    for token in ["", "has space", "semi;colon"] {
        let err = h.engine.hold(hold_req(GUEST, 1, 2, token)).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "{:?}", token);
    }
    let err = h
        .engine
        .hold(hold_req(GUEST, 1, 2, &"x".repeat(129)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    assert!(h.engine.find_by_requester(GUEST).is_empty());
    assert_eq!(h.engine.table_status(EVENT, 1), TableStatus::Free);
}

#[tokio::test]
async fn test_hold_capacity_exceeded() {
    let h = create_test_engine();

    let err = h.engine.hold(hold_req(GUEST, 5, 3, "k-1")).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::CapacityExceeded {
            guest_count: 3,
            capacity: 2
        }
    ));
    assert_eq!(h.engine.table_status(EVENT, 5), TableStatus::Free);

    // exactly at capacity is fine
    assert!(h.engine.hold(hold_req(GUEST, 5, 2, "k-2")).await.is_ok());
}

#[tokio::test]
async fn test_hold_unknown_table_or_event() {
    let h = create_test_engine();

    let err = h.engine.hold(hold_req(GUEST, 99, 2, "k-1")).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(ref what) if what == "Table 99"));

    h.layout.remove_event(VENUE, EVENT);
    let err = h.engine.hold(hold_req(GUEST, 1, 2, "k-2")).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(ref what) if what == "Event 55"));
    assert_eq!(h.engine.stats().occupied_tables, 0);
}

#[tokio::test]
async fn test_hold_lookup_failure_propagates() {
    let clock = Arc::new(ManualClock::new(t0()));
    let engine = BookingEngine::new(BookingConfig::defaults(), clock, Arc::new(FailingLayout));

    let err = engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap_err();
    assert!(matches!(err, BookingError::Lookup(_)));
    assert!(!err.is_business());
    assert!(err.to_string().contains("layout service unavailable"));
    assert_eq!(engine.stats(), EngineStats::default());
}

// ========================================================================
// Idempotency
// ========================================================================

#[tokio::test]
async fn test_hold_replay_returns_identical_body() {
    let h = create_test_engine();
    let first = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();
    let entry_before = h.engine.occupancy.get(TableKey::new(EVENT, 1)).unwrap();

    h.clock.advance(Duration::seconds(30));
    let second = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();

    assert!(second.cached);
    assert_eq!(second.body, first.body);
    assert_eq!(second.reservation, first.reservation);

    // no new mutation
    assert_eq!(h.engine.stats().reservations, 1);
    assert_eq!(
        h.engine.occupancy.get(TableKey::new(EVENT, 1)).unwrap(),
        entry_before
    );
    assert_eq!(h.engine.last_updated_at(EVENT), Some(t0()));
}

#[tokio::test]
async fn test_hold_same_key_different_body_conflicts() {
    let h = create_test_engine();
    let first = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();

    let err = h.engine.hold(hold_req(GUEST, 1, 3, "k-1")).await.unwrap_err();
    assert!(matches!(err, BookingError::IdempotencyConflict));
    assert_eq!(err.as_str(), "IDEMPOTENCY_CONFLICT");

    // the original response is untouched
    let replay = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();
    assert_eq!(replay.body, first.body);
    assert_eq!(h.engine.stats().reservations, 1);
}

#[tokio::test]
async fn test_idempotency_scoped_by_requester_and_venue() {
    let h = create_test_engine();
    h.engine.hold(hold_req(GUEST, 1, 2, "shared")).await.unwrap();

    // another requester reusing the token is a different request
    let outcome = h
        .engine
        .hold(hold_req(OTHER_GUEST, 2, 2, "shared"))
        .await
        .unwrap();
    assert!(!outcome.cached);

    let mut req = hold_req(GUEST, 3, 2, "shared");
    req.venue_id = OTHER_VENUE;
    h.layout.upsert_table(OTHER_VENUE, 3, 4);
    h.layout.upsert_event(OTHER_VENUE, EVENT, event_start());
    let outcome = h.engine.hold(req).await.unwrap();
    assert!(!outcome.cached);
    assert_eq!(h.engine.stats().reservations, 3);
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let h = create_test_engine();
    let blocker = held(&h, 1, 2).await;

    let err = h
        .engine
        .hold(hold_req(OTHER_GUEST, 1, 2, "retry-me"))
        .await
        .unwrap_err();
    assert_eq!(err.as_str(), "TABLE_NOT_AVAILABLE");

    h.clock.advance(Duration::minutes(11));
    let lapsed = h.engine.find_by_id(blocker.id).unwrap();
    assert!(lapsed.is_hold_expired(h.engine.now()));
    assert_eq!(h.engine.table_status(EVENT, 1), TableStatus::Free);
    let outcome = h
        .engine
        .hold(hold_req(OTHER_GUEST, 1, 2, "retry-me"))
        .await
        .unwrap();
    assert!(!outcome.cached);
}

#[tokio::test]
async fn test_replay_after_idempotency_ttl_executes_again() {
    let h = create_test_engine();
    let first = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();

    // hold and idempotency record both gone
    h.clock.advance(Duration::minutes(15) + Duration::seconds(1));
    let second = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();
    assert!(!second.cached);
    assert_ne!(second.reservation.id, first.reservation.id);
}
