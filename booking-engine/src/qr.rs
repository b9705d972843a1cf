//! 预订二维码
//!
//! 令牌格式 `BK:<booking_id>:<event_id>:<issued_at_secs>:<hmac_hex>`。
//! HMAC-SHA256 的密钥由配置密钥派生：`HMAC(key = "QrBooking", msg = secret)`。

use crate::core::BookingConfig;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::error::{AppError, ErrorCode};
use shared::models::{Reservation, ReservationStatus};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "BK:";
const KEY_LABEL: &[u8] = b"QrBooking";
const HMAC_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QrError {
    #[error("QR secret is not configured")]
    Disabled,

    #[error("Booking id and event id must be positive")]
    InvalidInput,

    #[error("Only confirmed bookings get a QR code")]
    NotConfirmed,

    #[error("Malformed QR token")]
    Malformed,

    #[error("QR signature mismatch")]
    BadSignature,

    #[error("QR token expired")]
    Expired,
}

impl From<QrError> for AppError {
    fn from(err: QrError) -> Self {
        let code = match err {
            QrError::Disabled => ErrorCode::ConfigError,
            QrError::InvalidInput => ErrorCode::ValidationFailed,
            QrError::NotConfirmed => ErrorCode::InvalidState,
            QrError::Malformed | QrError::BadSignature | QrError::Expired => {
                ErrorCode::QrTokenInvalid
            }
        };
        AppError::with_message(code, err.to_string())
    }
}

/// 解码后的二维码内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrPayload {
    pub booking_id: i64,
    pub event_id: i64,
    pub issued_at: DateTime<Utc>,
}

/// 二维码编解码器
#[derive(Clone)]
pub struct QrBookingCodec {
    key: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for QrBookingCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrBookingCodec")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl QrBookingCodec {
    /// 空白密钥或非正 TTL 视为禁用
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, QrError> {
        if secret.trim().is_empty() || ttl <= Duration::zero() {
            return Err(QrError::Disabled);
        }
        let mut mac = HmacSha256::new_from_slice(KEY_LABEL).map_err(|_| QrError::Disabled)?;
        mac.update(secret.as_bytes());
        Ok(Self {
            key: mac.finalize().into_bytes().to_vec(),
            ttl,
        })
    }

    pub fn from_config(config: &BookingConfig) -> Result<Self, QrError> {
        Self::new(&config.qr_secret, config.qr_ttl)
    }

    pub fn encode(
        &self,
        booking_id: i64,
        event_id: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<String, QrError> {
        let ts = issued_at.timestamp();
        if booking_id < 1 || event_id < 1 || ts < 0 {
            return Err(QrError::InvalidInput);
        }
        let message = format!("{}:{}:{}", booking_id, event_id, ts);
        let signature = hex::encode(self.sign(&message)?);
        Ok(format!("{}{}:{}", TOKEN_PREFIX, message, signature))
    }

    /// 为已确认的预订生成二维码
    pub fn encode_reservation(
        &self,
        reservation: &Reservation,
        issued_at: DateTime<Utc>,
    ) -> Result<String, QrError> {
        if reservation.status != ReservationStatus::Confirmed {
            return Err(QrError::NotConfirmed);
        }
        self.encode(reservation.id, reservation.event_id, issued_at)
    }

    /// 校验签名与有效期：`issued_at <= now <= issued_at + ttl`
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<QrPayload, QrError> {
        let body = token.strip_prefix(TOKEN_PREFIX).ok_or(QrError::Malformed)?;
        let parts: Vec<&str> = body.split(':').collect();
        let [booking, event, ts, signature] = parts.as_slice() else {
            return Err(QrError::Malformed);
        };

        let booking_id: i64 = booking.parse().map_err(|_| QrError::Malformed)?;
        let event_id: i64 = event.parse().map_err(|_| QrError::Malformed)?;
        let ts: i64 = ts.parse().map_err(|_| QrError::Malformed)?;
        if booking_id < 1 || event_id < 1 || ts < 0 || signature.len() != HMAC_HEX_LEN {
            return Err(QrError::Malformed);
        }
        let issued_at = DateTime::from_timestamp(ts, 0).ok_or(QrError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| QrError::Malformed)?;

        let message = format!("{}:{}:{}", booking_id, event_id, ts);
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| QrError::Disabled)?;
        mac.update(message.as_bytes());
        // constant-time comparison
        mac.verify_slice(&signature)
            .map_err(|_| QrError::BadSignature)?;

        if now < issued_at || now - issued_at > self.ttl {
            return Err(QrError::Expired);
        }
        Ok(QrPayload {
            booking_id,
            event_id,
            issued_at,
        })
    }

    fn sign(&self, message: &str) -> Result<Vec<u8>, QrError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| QrError::Disabled)?;
        mac.update(message.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
