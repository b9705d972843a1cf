//! Unified error codes for the booking workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 2xxx: Permission errors
//! - 4xxx: Booking errors
//! - 7xxx: Table errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,
    /// Idempotency key reused with a different request body
    IdempotencyConflict = 9,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Resource belongs to a different club/venue than the request scope
    ClubScopeMismatch = 2006,

    // ==================== 4xxx: Booking ====================
    /// Hold expired before confirmation
    HoldExpired = 4001,
    /// Operation not valid for the current booking status
    InvalidState = 4002,
    /// Plus-one deadline has passed
    LatePlusOneExpired = 4003,
    /// Plus-one already used on this booking
    PlusOneAlreadyUsed = 4004,
    /// Booking QR token is malformed, forged or expired
    QrTokenInvalid = 4005,

    // ==================== 7xxx: Table ====================
    /// Table is held or booked by another reservation
    TableNotAvailable = 7002,
    /// Guest count exceeds table capacity
    CapacityExceeded = 7005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::IdempotencyConflict => {
                "Idempotency key was already used for a different request"
            }

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::ClubScopeMismatch => "Booking belongs to a different club",

            // Booking
            ErrorCode::HoldExpired => "Table hold has expired",
            ErrorCode::InvalidState => "Operation is not valid for the current booking status",
            ErrorCode::LatePlusOneExpired => "Plus-one deadline has passed",
            ErrorCode::PlusOneAlreadyUsed => "Plus-one has already been used",
            ErrorCode::QrTokenInvalid => "Booking QR token is invalid or expired",

            // Table
            ErrorCode::TableNotAvailable => "Table is not available",
            ErrorCode::CapacityExceeded => "Guest count exceeds table capacity",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),
            9 => Ok(ErrorCode::IdempotencyConflict),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2006 => Ok(ErrorCode::ClubScopeMismatch),

            // Booking
            4001 => Ok(ErrorCode::HoldExpired),
            4002 => Ok(ErrorCode::InvalidState),
            4003 => Ok(ErrorCode::LatePlusOneExpired),
            4004 => Ok(ErrorCode::PlusOneAlreadyUsed),
            4005 => Ok(ErrorCode::QrTokenInvalid),

            // Table
            7002 => Ok(ErrorCode::TableNotAvailable),
            7005 => Ok(ErrorCode::CapacityExceeded),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
