//! 核心模块 - 配置、时钟、错误与后台任务
//!
//! # 模块结构
//!
//! - [`BookingConfig`] - 引擎配置
//! - [`Clock`] - 时间来源
//! - [`BookingError`] - 引擎错误
//! - [`BackgroundTasks`] - 后台任务管理

pub mod clock;
pub mod config;
pub mod error;
pub mod tasks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BookingConfig;
pub use error::{BookingError, EngineResult};
pub use tasks::{BackgroundTasks, TaskKind};
