//! 回收循环
//!
//! 每轮依次执行四个独立子任务：
//!
//! ```text
//! reclaim(now)
//!     ├─ (a) 释放过期锁台（预订状态不变，由确认时判定过期）
//!     ├─ (b) 清理过期幂等记录，超出上限时按创建时间淘汰；清理空闲的键锁
//!     ├─ (c) 移除超过保留期的预订，释放其仍占用的桌台
//!     └─ (d) 清理过期水位线
//! ```
//!
//! (a) 先于 (c)，保证同一轮内预订退役时桌台已释放。单个子任务 panic 只记录
//! 日志，不影响其余子任务。

use super::engine::BookingEngine;
use super::store::table_key;
use crate::core::tasks::panic_message;
use crate::core::{BackgroundTasks, TaskKind};
use chrono::{DateTime, Utc};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 单轮回收结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// 释放的过期锁台
    pub expired_holds: usize,
    /// TTL 过期的幂等记录
    pub purged_idempotency: usize,
    /// 超出上限被淘汰的幂等记录
    pub trimmed_idempotency: usize,
    /// 退役的预订
    pub retired_reservations: usize,
    /// 清理的活动水位线
    pub pruned_watermarks: usize,
    /// panic 的子任务数
    pub failed_passes: usize,
}

impl ReclaimReport {
    pub fn removed_anything(&self) -> bool {
        self.expired_holds
            + self.purged_idempotency
            + self.trimmed_idempotency
            + self.retired_reservations
            + self.pruned_watermarks
            > 0
    }
}

impl BookingEngine {
    /// 执行一轮回收
    pub fn reclaim(&self, now: DateTime<Utc>) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        match guarded("expired_holds", || self.occupancy.sweep_expired(now).len()) {
            Some(freed) => report.expired_holds = freed,
            None => report.failed_passes += 1,
        }

        match guarded("idempotency", || {
            let purged = self.idempotency.purge_expired(now);
            let trimmed = self.idempotency.trim_to_capacity();
            self.key_locks.purge_idle();
            (purged, trimmed)
        }) {
            Some((purged, trimmed)) => {
                report.purged_idempotency = purged;
                report.trimmed_idempotency = trimmed;
            }
            None => report.failed_passes += 1,
        }

        match guarded("retired_bookings", || {
            let retired = self.store.retire(now - self.config.booking_retention);
            for reservation in &retired {
                self.occupancy
                    .release_owned(table_key(reservation), reservation.id, now);
            }
            retired.len()
        }) {
            Some(retired) => report.retired_reservations = retired,
            None => report.failed_passes += 1,
        }

        match guarded("watermarks", || {
            self.watermarks.prune(now - self.config.watermark_retention)
        }) {
            Some(pruned) => report.pruned_watermarks = pruned,
            None => report.failed_passes += 1,
        }

        if report.removed_anything() {
            tracing::debug!(
                removed_locks = report.expired_holds,
                removed_idempotency = report.purged_idempotency + report.trimmed_idempotency,
                removed_bookings = report.retired_reservations,
                removed_watermarks = report.pruned_watermarks,
                "booking.cleanup"
            );
        }
        report
    }
}

/// 运行子任务并捕获 panic
fn guarded<T>(pass: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic_info) => {
            tracing::error!(
                pass = pass,
                panic = %panic_message(panic_info.as_ref()),
                "Reclamation pass panicked"
            );
            None
        }
    }
}

/// 回收循环
///
/// 注册为 `TaskKind::Periodic`，间隔等于幂等 TTL。
pub struct Reclaimer {
    engine: Arc<BookingEngine>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Reclaimer {
    pub fn new(engine: Arc<BookingEngine>, shutdown: CancellationToken) -> Self {
        let interval = engine.config().reclaim_interval();
        Self {
            engine,
            interval,
            shutdown,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 注册到后台任务管理器
    pub fn spawn(engine: Arc<BookingEngine>, tasks: &mut BackgroundTasks) {
        let reclaimer = Self::new(engine, tasks.shutdown_token());
        tasks.spawn("booking_reclaimer", TaskKind::Periodic, reclaimer.run());
    }

    /// 主循环
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Booking reclaimer started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Booking reclaimer received shutdown signal");
                    return;
                }
                _ = ticker.tick() => {
                    let report = self.engine.reclaim(self.engine.now());
                    if report.failed_passes > 0 {
                        tracing::warn!(failed = report.failed_passes, "Reclamation pass incomplete");
                    }
                    let stats = self.engine.stats();
                    tracing::debug!(
                        reservations = stats.reservations,
                        occupied_tables = stats.occupied_tables,
                        idempotency_entries = stats.idempotency_entries,
                        watermarks = stats.watermarks,
                        "Booking engine stats"
                    );
                }
            }
        }
    }
}
