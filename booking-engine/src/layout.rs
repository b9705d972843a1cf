//! 场地布局查询
//!
//! 引擎只读地消费桌台容量与活动开始时间。查询可能是异步的，引擎在持有
//! 任何内部锁之前完成等待。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// 桌台容量 / 活动时间查询
///
/// `Ok(None)` 表示资源不存在；`Err` 表示查询本身失败，原样传递给调用方。
#[async_trait]
pub trait LayoutLookup: Send + Sync {
    async fn table_capacity(
        &self,
        venue_id: i64,
        event_id: i64,
        table_id: i64,
    ) -> anyhow::Result<Option<i32>>;

    async fn event_start(&self, venue_id: i64, event_id: i64)
    -> anyhow::Result<Option<DateTime<Utc>>>;
}

/// 内存布局（嵌入与测试用）
#[derive(Debug, Default)]
pub struct InMemoryLayout {
    /// (venue, table) -> capacity
    tables: DashMap<(i64, i64), i32>,
    /// (venue, event) -> start
    events: DashMap<(i64, i64), DateTime<Utc>>,
}

impl InMemoryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_table(&self, venue_id: i64, table_id: i64, capacity: i32) {
        self.tables.insert((venue_id, table_id), capacity);
    }

    pub fn upsert_event(&self, venue_id: i64, event_id: i64, start: DateTime<Utc>) {
        self.events.insert((venue_id, event_id), start);
    }

    pub fn remove_table(&self, venue_id: i64, table_id: i64) {
        self.tables.remove(&(venue_id, table_id));
    }

    pub fn remove_event(&self, venue_id: i64, event_id: i64) {
        self.events.remove(&(venue_id, event_id));
    }
}

#[async_trait]
impl LayoutLookup for InMemoryLayout {
    async fn table_capacity(
        &self,
        venue_id: i64,
        _event_id: i64,
        table_id: i64,
    ) -> anyhow::Result<Option<i32>> {
        Ok(self.tables.get(&(venue_id, table_id)).map(|c| *c))
    }

    async fn event_start(
        &self,
        venue_id: i64,
        event_id: i64,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.events.get(&(venue_id, event_id)).map(|s| *s))
    }
}
