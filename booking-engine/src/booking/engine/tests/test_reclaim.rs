use super::*;

#[tokio::test]
async fn test_reclaim_frees_expired_holds() {
    let h = create_test_engine();
    let r = held(&h, 1, 2).await;

    let report = h.engine.reclaim(t0() + Duration::minutes(10));
    assert_eq!(report.expired_holds, 0);

    let at = t0() + Duration::minutes(11);
    let report = h.engine.reclaim(at);
    assert_eq!(report.expired_holds, 1);
    assert_eq!(report.failed_passes, 0);

    assert_eq!(h.engine.stats().occupied_tables, 0);
    assert_eq!(
        h.engine.store.get(r.id).unwrap().status,
        ReservationStatus::Held
    );
    assert_eq!(h.engine.last_updated_at_table(EVENT, 1), Some(at));
}

#[tokio::test]
async fn test_retention_removes_canceled_reservation() {
    let h = create_test_engine();
    let r = held(&h, 1, 2).await;

    h.clock.advance(Duration::minutes(11));
    let err = h
        .engine
        .confirm(confirm_req(GUEST, VENUE, r.id, "c-late"))
        .await
        .unwrap_err();
    assert_eq!(err.as_str(), "HOLD_EXPIRED");
    assert_eq!(
        h.engine.find_by_id(r.id).unwrap().status,
        ReservationStatus::Canceled
    );

    // effective end is the arrival window end
    h.clock.set(r.arrival_window.end + Duration::hours(48));
    assert!(h.engine.find_by_id(r.id).is_some());

    h.clock.advance(Duration::seconds(1));
    assert!(h.engine.find_by_id(r.id).is_none());
    assert!(h.engine.find_by_requester(GUEST).is_empty());
}

#[tokio::test]
async fn test_retention_removes_unconfirmed_hold() {
    let h = create_test_engine();
    let r = held(&h, 1, 2).await;
    let expired_at = r.hold_expires_at.unwrap();

    h.clock.set(expired_at + Duration::hours(48));
    assert!(h.engine.find_by_id(r.id).is_some());

    h.clock.advance(Duration::seconds(1));
    assert!(h.engine.find_by_id(r.id).is_none());
    assert_eq!(h.engine.stats().reservations, 0);
}

#[tokio::test]
async fn test_retention_releases_booked_table() {
    let h = create_test_engine();
    let r = confirmed(&h, 1, 2).await;

    let report = h
        .engine
        .reclaim(r.arrival_window.end + Duration::hours(48) + Duration::seconds(1));
    assert_eq!(report.retired_reservations, 1);
    assert_eq!(h.engine.stats().reservations, 0);
    assert_eq!(h.engine.stats().occupied_tables, 0);
}

#[tokio::test]
async fn test_reclaim_purges_idempotency() {
    let h = create_test_engine();
    h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap();
    assert_eq!(h.engine.stats().idempotency_entries, 1);

    let report = h
        .engine
        .reclaim(t0() + Duration::minutes(15) + Duration::seconds(1));
    assert_eq!(report.purged_idempotency, 1);
    assert_eq!(h.engine.stats().idempotency_entries, 0);
}

#[tokio::test]
async fn test_idempotency_cap_evicts_oldest() {
    let config = BookingConfig {
        idempotency_max_entries: 2,
        ..BookingConfig::defaults()
    };
    let h = create_test_engine_with(config);

    for table_id in 1..=3 {
        h.engine
            .hold(hold_req(GUEST, table_id, 2, &format!("k-{}", table_id)))
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(1));
    }
    assert_eq!(h.engine.stats().idempotency_entries, 2);

    // newest still replays
    let replay = h.engine.hold(hold_req(GUEST, 3, 2, "k-3")).await.unwrap();
    assert!(replay.cached);

    // oldest was evicted, so the retry runs again and meets its own hold
    let err = h.engine.hold(hold_req(GUEST, 1, 2, "k-1")).await.unwrap_err();
    assert_eq!(err.as_str(), "TABLE_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_watermarks_track_and_prune() {
    let h = create_test_engine();
    assert_eq!(h.engine.last_updated_at(EVENT), None);

    held(&h, 1, 2).await;
    assert_eq!(h.engine.last_updated_at(EVENT), Some(t0()));
    assert_eq!(h.engine.last_updated_at_table(EVENT, 2), None);

    let expired_at = t0() + Duration::minutes(11);
    h.engine.reclaim(expired_at);
    assert_eq!(h.engine.last_updated_at(EVENT), Some(expired_at));

    let report = h.engine.reclaim(t0() + Duration::days(8));
    assert_eq!(report.retired_reservations, 1);
    assert_eq!(report.pruned_watermarks, 1);
    assert_eq!(h.engine.last_updated_at(EVENT), None);
    assert_eq!(h.engine.last_updated_at_table(EVENT, 1), None);
    assert_eq!(h.engine.stats(), EngineStats::default());
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let h = create_test_engine();
    h.clock.advance(Duration::minutes(5));
    held(&h, 1, 2).await;

    // a sweep evaluated at an earlier instant must not rewind
    h.engine.occupancy.release(TableKey::new(EVENT, 1), t0());
    assert_eq!(
        h.engine.last_updated_at(EVENT),
        Some(t0() + Duration::minutes(5))
    );
}

#[tokio::test]
async fn test_stats_reflect_state() {
    let h = create_test_engine();
    held(&h, 1, 2).await;
    confirmed(&h, 2, 3).await;

    assert_eq!(
        h.engine.stats(),
        EngineStats {
            reservations: 2,
            occupied_tables: 2,
            idempotency_entries: 3,
            watermarks: 1,
        }
    );
}

#[tokio::test]
async fn test_watermark_read_sweeps_lapsed_holds_first() {
    let h = create_test_engine();
    held(&h, 1, 2).await;
    assert_eq!(h.engine.last_updated_at_table(EVENT, 1), Some(t0()));

    // no explicit reclaim: the read itself frees the lapsed hold
    h.clock.advance(Duration::minutes(11));
    let now = h.engine.now();
    assert_eq!(h.engine.last_updated_at(EVENT), Some(now));
    assert_eq!(h.engine.last_updated_at_table(EVENT, 1), Some(now));
    assert_eq!(h.engine.stats().occupied_tables, 0);
}
