//! Booking store
//!
//! Reservation records keyed by a monotonically increasing id. Records are
//! replaced wholesale under the key's shard lock (copy-on-write), so readers
//! never observe a half-applied update.

use super::occupancy::TableKey;
use super::watermark::WatermarkTracker;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::models::{Reservation, ReservationId, ReservationStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Result of a conditional update on an existing record
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The closure produced a replacement, which is now stored
    Applied(Reservation),
    /// The closure declined; carries the record as it stood
    Unchanged(Reservation),
}

#[derive(Debug)]
pub struct BookingStore {
    reservations: DashMap<ReservationId, Reservation>,
    next_id: AtomicI64,
    watermarks: Arc<WatermarkTracker>,
}

impl BookingStore {
    pub fn new(watermarks: Arc<WatermarkTracker>) -> Self {
        Self {
            reservations: DashMap::new(),
            next_id: AtomicI64::new(1),
            watermarks,
        }
    }

    /// Allocate the next reservation id (first id is 1).
    pub fn next_id(&self) -> ReservationId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, reservation: Reservation) {
        let key = table_key(&reservation);
        let at = reservation.updated_at;
        self.reservations.insert(reservation.id, reservation);
        self.watermarks.bump(key, at);
    }

    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).map(|r| r.value().clone())
    }

    /// All reservations of a requester, ordered by id.
    pub fn by_requester(&self, requester_id: i64) -> Vec<Reservation> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|r| r.id);
        found
    }

    pub fn venue_of(&self, id: ReservationId) -> Option<i64> {
        self.reservations.get(&id).map(|r| r.venue_id)
    }

    /// Atomic conditional replace.
    ///
    /// `f` sees the current record and returns its replacement, or `None` to
    /// leave it untouched. Returns `None` when the id is unknown.
    pub fn update<F>(&self, id: ReservationId, f: F) -> Option<UpdateOutcome>
    where
        F: FnOnce(&Reservation) -> Option<Reservation>,
    {
        let outcome = {
            let mut current = self.reservations.get_mut(&id)?;
            match f(current.value()) {
                Some(next) => {
                    *current = next.clone();
                    UpdateOutcome::Applied(next)
                }
                None => UpdateOutcome::Unchanged(current.value().clone()),
            }
        };
        if let UpdateOutcome::Applied(r) = &outcome {
            self.watermarks.bump(table_key(r), r.updated_at);
        }
        Some(outcome)
    }

    /// Remove reservations past `cutoff`: non-HELD ones by effective end,
    /// never-confirmed HELD ones by hold expiry.
    pub fn retire(&self, cutoff: DateTime<Utc>) -> Vec<Reservation> {
        let mut retired = Vec::new();
        self.reservations.retain(|_, r| {
            let expired = match r.status {
                ReservationStatus::Held => r.hold_expires_at.is_some_and(|exp| exp < cutoff),
                _ => r.effective_end() < cutoff,
            };
            if expired {
                retired.push(r.clone());
            }
            !expired
        });
        retired
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

pub(crate) fn table_key(r: &Reservation) -> TableKey {
    TableKey::new(r.event_id, r.table_id)
}

/// CANCELED copy of a held reservation
pub(crate) fn canceled_copy(r: &Reservation, now: DateTime<Utc>) -> Reservation {
    Reservation {
        status: ReservationStatus::Canceled,
        hold_expires_at: None,
        updated_at: now,
        ..r.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared::models::ArrivalWindow;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
    }

    fn held(store: &BookingStore, requester_id: i64, table_id: i64) -> Reservation {
        let now = t0();
        let reservation = Reservation {
            id: store.next_id(),
            requester_id,
            venue_id: 1,
            table_id,
            event_id: 55,
            status: ReservationStatus::Held,
            guest_count: 2,
            arrival_window: ArrivalWindow {
                start: now + Duration::hours(2),
                end: now + Duration::hours(3),
            },
            plus_one_deadline: Some(now + Duration::hours(3)),
            plus_one_used: false,
            capacity_at_hold: Some(4),
            created_at: now,
            updated_at: now,
            hold_expires_at: Some(now + Duration::minutes(10)),
        };
        store.insert(reservation.clone());
        reservation
    }

    fn new_store() -> BookingStore {
        BookingStore::new(Arc::new(WatermarkTracker::new()))
    }

    #[test]
    fn test_ids_start_at_one() {
        let store = new_store();
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_by_requester_sorted() {
        let store = new_store();
        let a = held(&store, 100, 1);
        held(&store, 200, 2);
        let c = held(&store, 100, 3);

        let ids: Vec<_> = store.by_requester(100).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(store.by_requester(300).is_empty());
        assert_eq!(store.venue_of(a.id), Some(1));
    }

    #[test]
    fn test_update_applies_or_reports_current() {
        let store = new_store();
        let r = held(&store, 100, 1);

        let outcome = store.update(r.id, |cur| {
            (cur.status == ReservationStatus::Held).then(|| Reservation {
                status: ReservationStatus::Confirmed,
                ..cur.clone()
            })
        });
        assert!(matches!(outcome, Some(UpdateOutcome::Applied(ref c)) if c.status == ReservationStatus::Confirmed));

        let outcome = store.update(r.id, |cur| {
            (cur.status == ReservationStatus::Held).then(|| cur.clone())
        });
        assert!(matches!(outcome, Some(UpdateOutcome::Unchanged(ref c)) if c.status == ReservationStatus::Confirmed));

        assert_eq!(store.update(999, |cur| Some(cur.clone())), None);
    }

    #[test]
    fn test_retire_canceled_by_effective_end() {
        let store = new_store();
        let done = held(&store, 100, 2);
        store.update(done.id, |cur| Some(canceled_copy(cur, t0())));

        // arrival window ends at t0 + 3h
        assert!(store.retire(t0() + Duration::hours(3)).is_empty());
        let retired = store.retire(t0() + Duration::hours(3) + Duration::seconds(1));
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].id, done.id);
        assert!(store.get(done.id).is_none());
    }

    #[test]
    fn test_retire_stale_held_by_hold_expiry() {
        let store = new_store();
        let stale = held(&store, 100, 1);

        // hold expires at t0 + 10m
        assert!(store.retire(t0() + Duration::minutes(10)).is_empty());
        assert_eq!(store.get(stale.id).unwrap().status, ReservationStatus::Held);

        let retired = store.retire(t0() + Duration::minutes(11));
        assert_eq!(retired.len(), 1);
        assert!(store.get(stale.id).is_none());
    }
}
