//! BookingEngine - hold / confirm / plus-one over shared in-memory state
//!
//! # Operation Flow
//!
//! ```text
//! hold / confirm / plus_one(request)
//!     ├─ 1. Opportunistic reclamation pass
//!     ├─ 2. Idempotency token format check
//!     ├─ 3. Wait for the key's in-flight lock (same-key retries queue here)
//!     ├─ 4. Idempotency replay (hit -> cached outcome, mismatch -> conflict)
//!     ├─ 5. Layout lookups (awaited before any map guard is taken)
//!     ├─ 6. Per-key atomic mutation (occupancy entry / reservation record)
//!     └─ 7. Record idempotent response, then release the key
//! ```
//!
//! # Reservation State Machine
//!
//! ```text
//! HELD --confirm--> CONFIRMED --retention--> (removed)
//! HELD --confirm after expiry--> CANCELED --retention--> (removed)
//! HELD (expired, never confirmed) --retention--> (removed)
//! ```

#[cfg(test)]
mod tests;

use super::idempotency::{
    IdempotencyCache, IdempotencyKey, KeyLocks, Lookup, OperationRoute, StoreOutcome,
    StoredResponse, validate_token,
};
use super::occupancy::{OccupancyMap, TableKey};
use super::store::{BookingStore, UpdateOutcome, canceled_copy, table_key};
use super::watermark::WatermarkTracker;
use crate::core::{BookingConfig, BookingError, Clock, EngineResult};
use crate::layout::LayoutLookup;
use chrono::{DateTime, Utc};
use shared::error::ApiResponse;
use shared::models::{
    ArrivalWindow, Reservation, ReservationId, ReservationStatus, ReservationView, TableStatus,
};
use std::sync::Arc;

/// Hold request
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub requester_id: i64,
    pub venue_id: i64,
    pub table_id: i64,
    pub event_id: i64,
    pub guest_count: i32,
    pub idempotency_key: String,
    pub request_hash: String,
}

/// Confirm request
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub requester_id: i64,
    pub venue_id: i64,
    pub reservation_id: ReservationId,
    pub idempotency_key: String,
    pub request_hash: String,
}

/// Plus-one request
#[derive(Debug, Clone)]
pub struct PlusOneRequest {
    pub requester_id: i64,
    pub reservation_id: ReservationId,
    pub idempotency_key: String,
    pub request_hash: String,
}

/// Successful operation result
#[derive(Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub reservation: Reservation,
    /// Serialized [`ReservationView`]; identical bytes on replay
    pub body: String,
    /// `true` when served from the idempotency cache
    pub cached: bool,
}

impl BookingOutcome {
    pub fn view(&self) -> ReservationView {
        self.reservation.to_view()
    }

    pub fn into_response(self) -> ApiResponse<ReservationView> {
        ApiResponse::success(self.reservation.to_view())
    }
}

/// Sizes of the shared structures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub reservations: usize,
    pub occupied_tables: usize,
    pub idempotency_entries: usize,
    pub watermarks: usize,
}

/// Table booking engine
pub struct BookingEngine {
    pub(super) config: BookingConfig,
    pub(super) clock: Arc<dyn Clock>,
    layout: Arc<dyn LayoutLookup>,
    pub(super) watermarks: Arc<WatermarkTracker>,
    pub(super) occupancy: OccupancyMap,
    pub(super) store: BookingStore,
    pub(super) idempotency: IdempotencyCache,
    pub(super) key_locks: KeyLocks,
}

impl std::fmt::Debug for BookingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEngine")
            .field("layout", &"<dyn LayoutLookup>")
            .field("stats", &self.stats())
            .finish()
    }
}

impl BookingEngine {
    pub fn new(config: BookingConfig, clock: Arc<dyn Clock>, layout: Arc<dyn LayoutLookup>) -> Self {
        let watermarks = Arc::new(WatermarkTracker::new());
        let idempotency =
            IdempotencyCache::new(config.idempotency_ttl, config.idempotency_max_entries);
        tracing::info!(
            hold_ttl_secs = config.hold_ttl.num_seconds(),
            idempotency_ttl_secs = config.idempotency_ttl.num_seconds(),
            idempotency_max_entries = config.idempotency_max_entries,
            "BookingEngine started"
        );
        Self {
            occupancy: OccupancyMap::new(watermarks.clone()),
            store: BookingStore::new(watermarks.clone()),
            watermarks,
            idempotency,
            key_locks: KeyLocks::new(),
            config,
            clock,
            layout,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    // ========== Effectful operations ==========

    /// Place a time-limited hold on a table for an event.
    pub async fn hold(&self, req: HoldRequest) -> EngineResult<BookingOutcome> {
        self.reclaim(self.clock.now());
        validate_token(&req.idempotency_key)?;

        let key = IdempotencyKey::new(
            req.requester_id,
            OperationRoute::Hold {
                venue_id: req.venue_id,
            },
            req.idempotency_key.as_str(),
        );
        let _in_flight = self.key_locks.acquire(&key).await;
        let now = self.clock.now();
        if let Some(replay) = self.replay(&key, &req.request_hash, now)? {
            return Ok(replay);
        }

        let result = self.execute_hold(&req, now).await;
        self.finish(key, &req.request_hash, now, result)
    }

    /// Turn a live hold into a booking.
    pub async fn confirm(&self, req: ConfirmRequest) -> EngineResult<BookingOutcome> {
        self.reclaim(self.clock.now());
        validate_token(&req.idempotency_key)?;

        let key = IdempotencyKey::new(
            req.requester_id,
            OperationRoute::Confirm {
                venue_id: req.venue_id,
                reservation_id: req.reservation_id,
            },
            req.idempotency_key.as_str(),
        );
        let _in_flight = self.key_locks.acquire(&key).await;
        let now = self.clock.now();
        if let Some(replay) = self.replay(&key, &req.request_hash, now)? {
            return Ok(replay);
        }

        let result = self.execute_confirm(&req, now);
        self.finish(key, &req.request_hash, now, result)
    }

    /// Add one guest to a confirmed booking, at most once.
    pub async fn plus_one(&self, req: PlusOneRequest) -> EngineResult<BookingOutcome> {
        self.reclaim(self.clock.now());
        validate_token(&req.idempotency_key)?;

        let key = IdempotencyKey::new(
            req.requester_id,
            OperationRoute::PlusOne {
                reservation_id: req.reservation_id,
            },
            req.idempotency_key.as_str(),
        );
        let _in_flight = self.key_locks.acquire(&key).await;
        let now = self.clock.now();
        if let Some(replay) = self.replay(&key, &req.request_hash, now)? {
            return Ok(replay);
        }

        let result = self.execute_plus_one(&req, now).await;
        self.finish(key, &req.request_hash, now, result)
    }

    // ========== Read operations ==========

    pub fn find_by_id(&self, id: ReservationId) -> Option<Reservation> {
        self.reclaim(self.clock.now());
        self.store.get(id)
    }

    pub fn find_by_requester(&self, requester_id: i64) -> Vec<Reservation> {
        self.reclaim(self.clock.now());
        self.store.by_requester(requester_id)
    }

    pub fn table_status(&self, event_id: i64, table_id: i64) -> TableStatus {
        let now = self.clock.now();
        self.reclaim(now);
        self.occupancy.status(TableKey::new(event_id, table_id), now)
    }

    pub fn venue_of(&self, id: ReservationId) -> Option<i64> {
        self.reclaim(self.clock.now());
        self.store.venue_of(id)
    }

    pub fn last_updated_at(&self, event_id: i64) -> Option<DateTime<Utc>> {
        self.reclaim(self.clock.now());
        self.watermarks.event(event_id)
    }

    pub fn last_updated_at_table(&self, event_id: i64, table_id: i64) -> Option<DateTime<Utc>> {
        self.reclaim(self.clock.now());
        self.watermarks.table(TableKey::new(event_id, table_id))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            reservations: self.store.len(),
            occupied_tables: self.occupancy.len(),
            idempotency_entries: self.idempotency.len(),
            watermarks: self.watermarks.len(),
        }
    }

    // ========== Internals ==========

    async fn execute_hold(&self, req: &HoldRequest, now: DateTime<Utc>) -> EngineResult<Reservation> {
        if req.guest_count < 1 {
            return Err(BookingError::Validation(
                "guest_count must be at least 1".into(),
            ));
        }

        let capacity = self
            .layout
            .table_capacity(req.venue_id, req.event_id, req.table_id)
            .await
            .map_err(BookingError::Lookup)?
            .ok_or_else(|| BookingError::NotFound(format!("Table {}", req.table_id)))?;
        if req.guest_count > capacity {
            return Err(BookingError::CapacityExceeded {
                guest_count: req.guest_count,
                capacity,
            });
        }

        let event_start = self
            .layout
            .event_start(req.venue_id, req.event_id)
            .await
            .map_err(BookingError::Lookup)?
            .ok_or_else(|| BookingError::NotFound(format!("Event {}", req.event_id)))?;

        let id = self.store.next_id();
        let table = TableKey::new(req.event_id, req.table_id);
        let expires_at = now + self.config.hold_ttl;
        if !self.occupancy.try_hold(table, id, expires_at, now) {
            tracing::debug!(
                event_id = req.event_id,
                table_id = req.table_id,
                requester_id = req.requester_id,
                "Hold rejected, table not available"
            );
            return Err(BookingError::TableNotAvailable {
                event_id: req.event_id,
                table_id: req.table_id,
            });
        }

        let reservation = Reservation {
            id,
            requester_id: req.requester_id,
            venue_id: req.venue_id,
            table_id: req.table_id,
            event_id: req.event_id,
            status: ReservationStatus::Held,
            guest_count: req.guest_count,
            arrival_window: ArrivalWindow {
                start: event_start - self.config.arrival_before,
                end: event_start + self.config.arrival_after,
            },
            plus_one_deadline: Some(event_start + self.config.late_plus_one_offset),
            plus_one_used: false,
            capacity_at_hold: Some(capacity),
            created_at: now,
            updated_at: now,
            hold_expires_at: Some(expires_at),
        };
        self.store.insert(reservation.clone());

        tracing::info!(
            reservation_id = id,
            event_id = req.event_id,
            table_id = req.table_id,
            guest_count = req.guest_count,
            expires_at = %expires_at,
            "Table held"
        );
        Ok(reservation)
    }

    fn execute_confirm(&self, req: &ConfirmRequest, now: DateTime<Utc>) -> EngineResult<Reservation> {
        let id = req.reservation_id;
        let current = self
            .store
            .get(id)
            .ok_or_else(|| BookingError::NotFound(format!("Reservation {}", id)))?;
        if current.requester_id != req.requester_id {
            return Err(BookingError::Forbidden(id));
        }
        if current.venue_id != req.venue_id {
            return Err(BookingError::ClubScopeMismatch(id));
        }
        if current.status != ReservationStatus::Held {
            return Err(state_error(&current));
        }

        let table = table_key(&current);
        let held = self
            .occupancy
            .get(table)
            .is_some_and(|entry| entry.is_held_by(id, now));
        if !held || current.is_hold_expired(now) {
            return Err(self.expire_hold(&current, now));
        }

        let confirmed = match self.store.update(id, |r| {
            (r.status == ReservationStatus::Held && !r.is_hold_expired(now)).then(|| Reservation {
                status: ReservationStatus::Confirmed,
                hold_expires_at: None,
                updated_at: now,
                ..r.clone()
            })
        }) {
            Some(UpdateOutcome::Applied(r)) => r,
            Some(UpdateOutcome::Unchanged(r)) if r.status == ReservationStatus::Held => {
                return Err(self.expire_hold(&r, now));
            }
            Some(UpdateOutcome::Unchanged(r)) => return Err(state_error(&r)),
            None => return Err(BookingError::NotFound(format!("Reservation {}", id))),
        };

        if !self.occupancy.transition_to_booked(table, id, now) {
            // the hold was swept and re-taken between the check and the update
            tracing::warn!(
                reservation_id = id,
                event_id = table.event_id,
                table_id = table.table_id,
                "Occupancy lost during confirm, rolling back"
            );
            self.store.update(id, |r| {
                (r.status == ReservationStatus::Confirmed).then(|| canceled_copy(r, now))
            });
            self.occupancy.release_owned(table, id, now);
            return Err(BookingError::HoldExpired(id));
        }

        tracing::info!(
            reservation_id = id,
            event_id = table.event_id,
            table_id = table.table_id,
            "Reservation confirmed"
        );
        Ok(confirmed)
    }

    /// Cancel a HELD reservation found expired at confirm time and free its
    /// table. Returns the error the caller should see.
    fn expire_hold(&self, current: &Reservation, now: DateTime<Utc>) -> BookingError {
        let id = current.id;
        match self.store.update(id, |r| {
            (r.status == ReservationStatus::Held).then(|| canceled_copy(r, now))
        }) {
            Some(UpdateOutcome::Applied(r)) => {
                self.occupancy.release_owned(table_key(&r), id, now);
                tracing::info!(reservation_id = id, "Hold expired before confirm");
                BookingError::HoldExpired(id)
            }
            // a concurrent confirm got there first
            Some(UpdateOutcome::Unchanged(r)) if r.status == ReservationStatus::Confirmed => {
                state_error(&r)
            }
            Some(UpdateOutcome::Unchanged(_)) => BookingError::HoldExpired(id),
            None => BookingError::NotFound(format!("Reservation {}", id)),
        }
    }

    async fn execute_plus_one(
        &self,
        req: &PlusOneRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<Reservation> {
        let id = req.reservation_id;
        let current = self
            .store
            .get(id)
            .ok_or_else(|| BookingError::NotFound(format!("Reservation {}", id)))?;
        if current.requester_id != req.requester_id {
            return Err(BookingError::Forbidden(id));
        }

        let capacity = match current.capacity_at_hold {
            Some(capacity) => capacity,
            None => self
                .layout
                .table_capacity(current.venue_id, current.event_id, current.table_id)
                .await
                .map_err(BookingError::Lookup)?
                .ok_or_else(|| BookingError::NotFound(format!("Table {}", current.table_id)))?,
        };

        match self.store.update(id, |r| {
            let eligible = r.status == ReservationStatus::Confirmed
                && !r.plus_one_used
                && !r.plus_one_deadline_passed(now)
                && r.guest_count < capacity;
            eligible.then(|| Reservation {
                guest_count: r.guest_count + 1,
                plus_one_used: true,
                updated_at: now,
                ..r.clone()
            })
        }) {
            Some(UpdateOutcome::Applied(r)) => {
                tracing::info!(
                    reservation_id = id,
                    guest_count = r.guest_count,
                    "Plus-one applied"
                );
                Ok(r)
            }
            // classify from the record as it stands after the attempt
            Some(UpdateOutcome::Unchanged(r)) => Err(classify_plus_one(&r, capacity, now)),
            None => Err(BookingError::NotFound(format!("Reservation {}", id))),
        }
    }

    /// Replay a cached outcome for `key`, if any.
    fn replay(
        &self,
        key: &IdempotencyKey,
        request_hash: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<BookingOutcome>> {
        match self.idempotency.lookup(key, request_hash, now) {
            Lookup::Hit(record) => {
                tracing::debug!(
                    requester_id = key.requester_id,
                    route = %key.route,
                    reservation_id = record.reservation.id,
                    "Idempotent replay"
                );
                Ok(Some(BookingOutcome {
                    reservation: record.reservation,
                    body: record.body,
                    cached: true,
                }))
            }
            Lookup::Conflict => {
                tracing::warn!(
                    requester_id = key.requester_id,
                    route = %key.route,
                    "Idempotency key reused with a different request"
                );
                Err(BookingError::IdempotencyConflict)
            }
            Lookup::Absent | Lookup::Expired => Ok(None),
        }
    }

    /// Record a success under the key still held by the caller.
    fn finish(
        &self,
        key: IdempotencyKey,
        request_hash: &str,
        now: DateTime<Utc>,
        result: EngineResult<Reservation>,
    ) -> EngineResult<BookingOutcome> {
        let reservation = result?;
        let body = serde_json::to_string(&reservation.to_view())?;
        let record = StoredResponse {
            request_hash: request_hash.to_string(),
            body: body.clone(),
            reservation: reservation.clone(),
            created_at: now,
        };
        match self.idempotency.store(key, record, now) {
            StoreOutcome::Inserted => Ok(BookingOutcome {
                reservation,
                body,
                cached: false,
            }),
            StoreOutcome::Existing(winner) if winner.request_hash == request_hash => {
                Ok(BookingOutcome {
                    reservation: winner.reservation,
                    body: winner.body,
                    cached: true,
                })
            }
            StoreOutcome::Existing(_) => Err(BookingError::IdempotencyConflict),
        }
    }
}

fn state_error(r: &Reservation) -> BookingError {
    BookingError::InvalidState {
        id: r.id,
        status: r.status,
    }
}

fn classify_plus_one(r: &Reservation, capacity: i32, now: DateTime<Utc>) -> BookingError {
    if r.status != ReservationStatus::Confirmed {
        state_error(r)
    } else if r.plus_one_used {
        BookingError::PlusOneAlreadyUsed(r.id)
    } else if r.plus_one_deadline_passed(now) {
        BookingError::LatePlusOneExpired(r.id)
    } else {
        BookingError::CapacityExceeded {
            guest_count: r.guest_count + 1,
            capacity,
        }
    }
}
