//! 预订分配引擎
//!
//! - [`occupancy`] - 桌台占用（互斥锁台）
//! - [`idempotency`] - 幂等缓存
//! - [`store`] - 预订存储
//! - [`watermark`] - 活动水位线
//! - [`engine`] - 引擎门面
//! - [`reclaim`] - 回收循环

pub mod engine;
pub mod idempotency;
pub mod occupancy;
pub mod reclaim;
pub mod store;
pub mod watermark;

pub use engine::{
    BookingEngine, BookingOutcome, ConfirmRequest, EngineStats, HoldRequest, PlusOneRequest,
};
pub use idempotency::{IdempotencyKey, OperationRoute};
pub use occupancy::TableKey;
pub use reclaim::{ReclaimReport, Reclaimer};
