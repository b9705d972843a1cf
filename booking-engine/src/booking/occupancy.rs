//! Table occupancy map
//!
//! One entry per (event, table). An absent entry is FREE; a HELD entry past
//! its expiry is treated as FREE and may be overwritten or pruned. Every
//! check-and-set runs under the key's shard lock, so at most one entry can
//! be non-FREE for a key at any instant.

use super::watermark::WatermarkTracker;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::models::{ReservationId, TableStatus};
use std::sync::Arc;

/// (event, table) occupancy key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub event_id: i64,
    pub table_id: i64,
}

impl TableKey {
    pub fn new(event_id: i64, table_id: i64) -> Self {
        Self { event_id, table_id }
    }
}

/// Non-FREE occupancy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyEntry {
    pub status: TableStatus,
    pub reservation_id: ReservationId,
    /// Set only while HELD
    pub expires_at: Option<DateTime<Utc>>,
}

impl OccupancyEntry {
    fn held(reservation_id: ReservationId, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: TableStatus::Held,
            reservation_id,
            expires_at: Some(expires_at),
        }
    }

    fn booked(reservation_id: ReservationId) -> Self {
        Self {
            status: TableStatus::Booked,
            reservation_id,
            expires_at: None,
        }
    }

    /// HELD and past expiry
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == TableStatus::Held && self.expires_at.is_some_and(|exp| exp < now)
    }

    pub fn is_held_by(&self, reservation_id: ReservationId, now: DateTime<Utc>) -> bool {
        self.status == TableStatus::Held
            && self.reservation_id == reservation_id
            && !self.is_stale(now)
    }
}

#[derive(Debug)]
pub struct OccupancyMap {
    entries: DashMap<TableKey, OccupancyEntry>,
    watermarks: Arc<WatermarkTracker>,
}

impl OccupancyMap {
    pub fn new(watermarks: Arc<WatermarkTracker>) -> Self {
        Self {
            entries: DashMap::new(),
            watermarks,
        }
    }

    /// Claim `key` for `reservation_id` if it is FREE (or held past expiry).
    pub fn try_hold(
        &self,
        key: TableKey,
        reservation_id: ReservationId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let accepted = match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(OccupancyEntry::held(reservation_id, expires_at));
                true
            }
            Entry::Occupied(mut slot) if slot.get().is_stale(now) => {
                let previous = slot.insert(OccupancyEntry::held(reservation_id, expires_at));
                tracing::debug!(
                    event_id = key.event_id,
                    table_id = key.table_id,
                    previous_reservation = previous.reservation_id,
                    "Replaced expired hold"
                );
                true
            }
            Entry::Occupied(_) => false,
        };
        if accepted {
            self.watermarks.bump(key, now);
        }
        accepted
    }

    /// HELD by `reservation_id` and not expired -> BOOKED.
    pub fn transition_to_booked(
        &self,
        key: TableKey,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> bool {
        {
            let Some(mut entry) = self.entries.get_mut(&key) else {
                return false;
            };
            if !entry.is_held_by(reservation_id, now) {
                return false;
            }
            *entry = OccupancyEntry::booked(reservation_id);
        }
        self.watermarks.bump(key, now);
        true
    }

    /// Reset to FREE regardless of owner.
    pub fn release(&self, key: TableKey, now: DateTime<Utc>) -> bool {
        let released = self.entries.remove(&key).is_some();
        if released {
            self.watermarks.bump(key, now);
        }
        released
    }

    /// Reset to FREE only if owned by `reservation_id` or stale.
    pub fn release_owned(
        &self,
        key: TableKey,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> bool {
        let released = self
            .entries
            .remove_if(&key, |_, entry| {
                entry.reservation_id == reservation_id || entry.is_stale(now)
            })
            .is_some();
        if released {
            self.watermarks.bump(key, now);
        }
        released
    }

    /// Effective status; an expired hold is freed on the way.
    pub fn status(&self, key: TableKey, now: DateTime<Utc>) -> TableStatus {
        if self
            .entries
            .remove_if(&key, |_, entry| entry.is_stale(now))
            .is_some()
        {
            self.watermarks.bump(key, now);
            return TableStatus::Free;
        }
        self.entries
            .get(&key)
            .map(|entry| entry.status)
            .unwrap_or(TableStatus::Free)
    }

    pub fn get(&self, key: TableKey) -> Option<OccupancyEntry> {
        self.entries.get(&key).map(|entry| *entry)
    }

    /// Free every expired hold; returns the freed keys with their former holder.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<(TableKey, ReservationId)> {
        let mut freed = Vec::new();
        self.entries.retain(|key, entry| {
            if entry.is_stale(now) {
                freed.push((*key, entry.reservation_id));
                false
            } else {
                true
            }
        });
        for (key, _) in &freed {
            self.watermarks.bump(*key, now);
        }
        freed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
