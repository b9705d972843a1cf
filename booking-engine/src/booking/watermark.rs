//! Event watermarks
//!
//! Latest mutation timestamp per event and per (event, table), for cheap
//! freshness checks by polling clients.

use super::occupancy::TableKey;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::hash::Hash;

#[derive(Debug, Default)]
pub struct WatermarkTracker {
    events: DashMap<i64, DateTime<Utc>>,
    tables: DashMap<TableKey, DateTime<Utc>>,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation on `key`; never moves a watermark backwards.
    pub fn bump(&self, key: TableKey, at: DateTime<Utc>) {
        bump_max(&self.events, key.event_id, at);
        bump_max(&self.tables, key, at);
    }

    pub fn event(&self, event_id: i64) -> Option<DateTime<Utc>> {
        self.events.get(&event_id).map(|ts| *ts)
    }

    pub fn table(&self, key: TableKey) -> Option<DateTime<Utc>> {
        self.tables.get(&key).map(|ts| *ts)
    }

    /// Drop watermarks older than `cutoff`. Returns the number of event
    /// watermarks removed.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.events.len();
        self.events.retain(|_, ts| *ts >= cutoff);
        self.tables.retain(|_, ts| *ts >= cutoff);
        before.saturating_sub(self.events.len())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn bump_max<K: Eq + Hash>(map: &DashMap<K, DateTime<Utc>>, key: K, at: DateTime<Utc>) {
    map.entry(key)
        .and_modify(|ts| {
            if at > *ts {
                *ts = at;
            }
        })
        .or_insert(at);
}
