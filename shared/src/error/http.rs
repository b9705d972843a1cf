//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::IdempotencyConflict
            | Self::TableNotAvailable
            | Self::HoldExpired
            | Self::InvalidState
            | Self::PlusOneAlreadyUsed
            | Self::LatePlusOneExpired => StatusCode::CONFLICT,

            // 403 Forbidden
            Self::PermissionDenied | Self::ClubScopeMismatch => StatusCode::FORBIDDEN,

            // 500 Internal Server Error
            Self::InternalError | Self::ConfigError | Self::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (default for validation errors)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::CapacityExceeded
            | Self::QrTokenInvalid => StatusCode::BAD_REQUEST,
        }
    }
}
