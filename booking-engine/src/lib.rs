//! Booking Engine - 活动夜桌台预订分配引擎
//!
//! # 架构概述
//!
//! 纯内存、单进程的分配核心，保证：
//!
//! - **互斥**: 同一 (活动, 桌台) 任意时刻最多一个有效占用
//! - **幂等**: 相同幂等键 + 相同请求体的重试只产生一次效果
//! - **过期**: 未确认的锁台按 TTL 确定性过期
//! - **回收**: 后台循环清理过期锁台、幂等记录、退役预订与水位线
//!
//! 所有共享结构都基于 `DashMap` 的按键原子操作，不使用全局锁。
//!
//! # 模块结构
//!
//! ```text
//! booking-engine/src/
//! ├── core/          # 配置、时钟、错误、后台任务
//! ├── booking/       # 占用表、幂等缓存、预订存储、水位线、引擎、回收
//! ├── layout.rs      # 场地布局查询接口
//! ├── qr.rs          # 预订二维码
//! ├── request_hash.rs # 请求摘要
//! └── utils/         # 日志
//! ```

pub mod booking;
pub mod core;
pub mod layout;
pub mod qr;
pub mod request_hash;
pub mod utils;

// Re-export 公共类型
pub use booking::{
    BookingEngine, BookingOutcome, ConfirmRequest, EngineStats, HoldRequest, PlusOneRequest,
    ReclaimReport, Reclaimer, TableKey,
};
pub use core::{
    BackgroundTasks, BookingConfig, BookingError, Clock, EngineResult, ManualClock, SystemClock,
    TaskKind,
};
pub use layout::{InMemoryLayout, LayoutLookup};
pub use qr::{QrBookingCodec, QrError, QrPayload};
pub use request_hash::hash_request_canonical;

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_level};

/// 设置运行环境：加载 `.env`，按 `LOG_LEVEL` 初始化日志
pub fn setup_environment() -> Result<BookingConfig, Box<dyn std::error::Error>> {
    match dotenv::dotenv() {
        Ok(path) => eprintln!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let config = BookingConfig::from_env();
    init_logger_with_level(Some(&config.log_level), false);
    Ok(config)
}
