//! Idempotency cache
//!
//! Keyed by (requester, operation route, client token). The first writer of
//! a key wins; a later store for a live key hands back the winner instead of
//! overwriting it. Entries leave by TTL or by oldest-created trimming once
//! the cache grows past its cap.
//!
//! [`KeyLocks`] serializes attempts that share a key, so a retry arriving
//! while the first attempt is still running waits and then replays it.

use crate::core::BookingError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::models::{Reservation, ReservationId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const TOKEN_MAX_LEN: usize = 128;

/// Logical operation a token is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationRoute {
    Hold {
        venue_id: i64,
    },
    Confirm {
        venue_id: i64,
        reservation_id: ReservationId,
    },
    PlusOne {
        reservation_id: ReservationId,
    },
}

impl fmt::Display for OperationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationRoute::Hold { venue_id } => write!(f, "hold:{}", venue_id),
            OperationRoute::Confirm {
                venue_id,
                reservation_id,
            } => write!(f, "confirm:{}:{}", venue_id, reservation_id),
            OperationRoute::PlusOne { reservation_id } => write!(f, "plus-one:{}", reservation_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub requester_id: i64,
    pub route: OperationRoute,
    pub token: String,
}

impl IdempotencyKey {
    pub fn new(requester_id: i64, route: OperationRoute, token: impl Into<String>) -> Self {
        Self {
            requester_id,
            route,
            token: token.into(),
        }
    }
}

/// Recorded outcome of a successful operation
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub request_hash: String,
    /// Serialized reservation view, replayed byte for byte
    pub body: String,
    pub reservation: Reservation,
    pub created_at: DateTime<Utc>,
}

impl StoredResponse {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.created_at + ttl < now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Absent,
    /// An expired record was found and dropped
    Expired,
    /// Same key, different request hash
    Conflict,
    Hit(StoredResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    Inserted,
    /// A live record already held the key; it is returned untouched
    Existing(StoredResponse),
}

#[derive(Debug)]
pub struct IdempotencyCache {
    entries: DashMap<IdempotencyKey, StoredResponse>,
    ttl: Duration,
    max_entries: usize,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn lookup(&self, key: &IdempotencyKey, request_hash: &str, now: DateTime<Utc>) -> Lookup {
        let ttl = self.ttl;
        if self
            .entries
            .remove_if(key, |_, record| record.is_expired(ttl, now))
            .is_some()
        {
            return Lookup::Expired;
        }
        match self.entries.get(key) {
            None => Lookup::Absent,
            Some(record) if record.request_hash != request_hash => Lookup::Conflict,
            Some(record) => Lookup::Hit(record.value().clone()),
        }
    }

    /// Insert-if-absent. An expired occupant is replaced.
    pub fn store(
        &self,
        key: IdempotencyKey,
        record: StoredResponse,
        now: DateTime<Utc>,
    ) -> StoreOutcome {
        let outcome = match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                StoreOutcome::Inserted
            }
            Entry::Occupied(mut slot) if slot.get().is_expired(self.ttl, now) => {
                slot.insert(record);
                StoreOutcome::Inserted
            }
            Entry::Occupied(slot) => StoreOutcome::Existing(slot.get().clone()),
        };
        if outcome == StoreOutcome::Inserted && self.entries.len() > self.max_entries {
            self.trim_to_capacity();
        }
        outcome
    }

    /// Drop records past TTL; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        self.entries.retain(|_, record| {
            let keep = !record.is_expired(ttl, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Evict oldest-created records until at most `max_entries` remain.
    pub fn trim_to_capacity(&self) -> usize {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(IdempotencyKey, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        by_age
            .into_iter()
            .take(excess)
            .filter(|(key, created_at)| {
                // skip records replaced since the snapshot
                self.entries
                    .remove_if(key, |_, record| record.created_at == *created_at)
                    .is_some()
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-key in-flight locks
///
/// An entry lives while some caller holds or waits for it; the last guard
/// out removes it.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<IdempotencyKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other attempt holds `key`.
    pub async fn acquire(&self, key: &IdempotencyKey) -> KeyGuard<'_> {
        let lock = self.locks.entry(key.clone()).or_default().value().clone();
        let guard = lock.clone().lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.clone(),
            lock,
            guard: Some(guard),
        }
    }

    /// Drop entries nobody holds or waits for.
    pub fn purge_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive hold on one idempotency key
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: IdempotencyKey,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // map entry + self.lock; any extra count is a waiter
        self.locks.locks.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Client tokens: 1-128 chars of `[A-Za-z0-9._~:-]`
pub fn validate_token(token: &str) -> Result<(), BookingError> {
    let well_formed = !token.is_empty()
        && token.len() <= TOKEN_MAX_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b':' | b'-'));
    if well_formed {
        Ok(())
    } else {
        Err(BookingError::Validation(
            "idempotency key must be 1-128 characters of [A-Za-z0-9._~:-]".into(),
        ))
    }
}
