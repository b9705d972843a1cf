use chrono::Duration;

const DEFAULT_HOLD_TTL_SECS: i64 = 600;
const DEFAULT_IDEMPOTENCY_TTL_SECS: i64 = 900;
const DEFAULT_ARRIVAL_BEFORE_SECS: i64 = 900;
const DEFAULT_ARRIVAL_AFTER_SECS: i64 = 2700;
const DEFAULT_LATE_PLUS_ONE_OFFSET_SECS: i64 = 1800;
const DEFAULT_RETENTION_SECS: i64 = 172_800;
const DEFAULT_WATERMARK_RETENTION_SECS: i64 = 604_800;
const DEFAULT_IDEMPOTENCY_MAX_ENTRIES: usize = 10_000;
const DEFAULT_QR_TTL_SECS: i64 = 86_400;

/// 预订引擎配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（单位：秒）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | BOOKING_HOLD_TTL_SECS | 600 | 锁台有效期 |
/// | BOOKING_IDEMPOTENCY_TTL_SECS | 900 | 幂等记录有效期，同时是回收间隔 |
/// | BOOKING_ARRIVAL_BEFORE_SECS | 900 | 活动开始前的到店窗口 |
/// | BOOKING_ARRIVAL_AFTER_SECS | 2700 | 活动开始后的到店窗口 |
/// | BOOKING_LATE_PLUS_ONE_OFFSET_SECS | 1800 | +1 截止时间（相对活动开始） |
/// | BOOKING_RETENTION_SECS | 172800 | 预订保留期 |
/// | BOOKING_WATERMARK_RETENTION_SECS | 604800 | 水位线保留期 |
/// | BOOKING_IDEMPOTENCY_MAX_ENTRIES | 10000 | 幂等缓存上限（条） |
/// | BOOKING_QR_TTL_SECS | 86400 | 二维码有效期 |
/// | BOOKING_QR_SECRET | (空) | 二维码 HMAC 密钥，为空时禁用 |
/// | LOG_LEVEL | info | 日志级别 |
///
/// 无法解析或为负数的值回退到默认值。
///
/// # 示例
///
/// ```ignore
/// BOOKING_HOLD_TTL_SECS=300 LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// 锁台有效期
    pub hold_ttl: Duration,
    /// 幂等记录有效期
    pub idempotency_ttl: Duration,
    /// 到店窗口：活动开始前
    pub arrival_before: Duration,
    /// 到店窗口：活动开始后
    pub arrival_after: Duration,
    /// +1 截止偏移
    pub late_plus_one_offset: Duration,
    /// 非 HELD 预订在有效结束时间之后的保留期
    pub booking_retention: Duration,
    /// 活动水位线保留期
    pub watermark_retention: Duration,
    /// 幂等缓存最大条数
    pub idempotency_max_entries: usize,
    /// 二维码有效期
    pub qr_ttl: Duration,
    /// 二维码签名密钥
    pub qr_secret: String,
    /// 日志级别
    pub log_level: String,
}

impl BookingConfig {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            hold_ttl: env_secs("BOOKING_HOLD_TTL_SECS", DEFAULT_HOLD_TTL_SECS),
            idempotency_ttl: env_secs("BOOKING_IDEMPOTENCY_TTL_SECS", DEFAULT_IDEMPOTENCY_TTL_SECS),
            arrival_before: env_secs("BOOKING_ARRIVAL_BEFORE_SECS", DEFAULT_ARRIVAL_BEFORE_SECS),
            arrival_after: env_secs("BOOKING_ARRIVAL_AFTER_SECS", DEFAULT_ARRIVAL_AFTER_SECS),
            late_plus_one_offset: env_secs(
                "BOOKING_LATE_PLUS_ONE_OFFSET_SECS",
                DEFAULT_LATE_PLUS_ONE_OFFSET_SECS,
            ),
            booking_retention: env_secs("BOOKING_RETENTION_SECS", DEFAULT_RETENTION_SECS),
            watermark_retention: env_secs(
                "BOOKING_WATERMARK_RETENTION_SECS",
                DEFAULT_WATERMARK_RETENTION_SECS,
            ),
            idempotency_max_entries: std::env::var("BOOKING_IDEMPOTENCY_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(DEFAULT_IDEMPOTENCY_MAX_ENTRIES),
            qr_ttl: env_secs("BOOKING_QR_TTL_SECS", DEFAULT_QR_TTL_SECS),
            qr_secret: std::env::var("BOOKING_QR_SECRET").unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        }
    }

    /// 不读取环境变量的默认配置
    ///
    /// 常用于测试场景
    pub fn defaults() -> Self {
        Self {
            hold_ttl: Duration::seconds(DEFAULT_HOLD_TTL_SECS),
            idempotency_ttl: Duration::seconds(DEFAULT_IDEMPOTENCY_TTL_SECS),
            arrival_before: Duration::seconds(DEFAULT_ARRIVAL_BEFORE_SECS),
            arrival_after: Duration::seconds(DEFAULT_ARRIVAL_AFTER_SECS),
            late_plus_one_offset: Duration::seconds(DEFAULT_LATE_PLUS_ONE_OFFSET_SECS),
            booking_retention: Duration::seconds(DEFAULT_RETENTION_SECS),
            watermark_retention: Duration::seconds(DEFAULT_WATERMARK_RETENTION_SECS),
            idempotency_max_entries: DEFAULT_IDEMPOTENCY_MAX_ENTRIES,
            qr_ttl: Duration::seconds(DEFAULT_QR_TTL_SECS),
            qr_secret: String::new(),
            log_level: "info".into(),
        }
    }

    /// 回收循环间隔（等于幂等 TTL，至少 1 秒）
    pub fn reclaim_interval(&self) -> std::time::Duration {
        self.idempotency_ttl
            .to_std()
            .unwrap_or_default()
            .max(std::time::Duration::from_secs(1))
    }

    /// 是否启用二维码
    pub fn qr_enabled(&self) -> bool {
        !self.qr_secret.trim().is_empty() && self.qr_ttl > Duration::zero()
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_secs(name: &str, default: i64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(default);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BookingConfig::defaults();
        assert_eq!(config.hold_ttl, Duration::minutes(10));
        assert_eq!(config.idempotency_ttl, Duration::minutes(15));
        assert_eq!(config.arrival_before, Duration::minutes(15));
        assert_eq!(config.arrival_after, Duration::minutes(45));
        assert_eq!(config.late_plus_one_offset, Duration::minutes(30));
        assert_eq!(config.booking_retention, Duration::hours(48));
        assert_eq!(config.watermark_retention, Duration::days(7));
        assert_eq!(config.idempotency_max_entries, 10_000);
        assert!(!config.qr_enabled());
    }

    #[test]
    fn test_reclaim_interval_follows_idempotency_ttl() {
        let mut config = BookingConfig::defaults();
        assert_eq!(config.reclaim_interval(), std::time::Duration::from_secs(900));

        config.idempotency_ttl = Duration::zero();
        assert_eq!(config.reclaim_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_env_secs_falls_back_on_garbage() {
        // 仅本测试使用的变量名
        unsafe {
            std::env::set_var("BOOKING_TEST_ONLY_GARBAGE_SECS", "ten");
            std::env::set_var("BOOKING_TEST_ONLY_NEGATIVE_SECS", "-5");
            std::env::set_var("BOOKING_TEST_ONLY_VALID_SECS", " 42 ");
        }
        assert_eq!(
            env_secs("BOOKING_TEST_ONLY_GARBAGE_SECS", 7),
            Duration::seconds(7)
        );
        assert_eq!(
            env_secs("BOOKING_TEST_ONLY_NEGATIVE_SECS", 7),
            Duration::seconds(7)
        );
        assert_eq!(
            env_secs("BOOKING_TEST_ONLY_VALID_SECS", 7),
            Duration::seconds(42)
        );
    }
}
