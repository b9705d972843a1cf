use shared::error::{ApiResponse, AppError, ErrorCategory, ErrorCode};
use shared::models::{ReservationId, ReservationStatus};
use thiserror::Error;

/// Booking engine errors
///
/// Every anticipated race (lost hold, hold expired at confirm time,
/// concurrent plus-one) resolves to one of the business variants. Only
/// `Lookup` and `Serialization` carry unexpected failures.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Guest count {guest_count} exceeds table capacity {capacity}")]
    CapacityExceeded { guest_count: i32, capacity: i32 },

    #[error("Table {table_id} is not available for event {event_id}")]
    TableNotAvailable { event_id: i64, table_id: i64 },

    #[error("Idempotency key was already used for a different request")]
    IdempotencyConflict,

    #[error("Hold expired for reservation {0}")]
    HoldExpired(ReservationId),

    #[error("Reservation {id} is {status}")]
    InvalidState {
        id: ReservationId,
        status: ReservationStatus,
    },

    #[error("Plus-one deadline passed for reservation {0}")]
    LatePlusOneExpired(ReservationId),

    #[error("Plus-one already used for reservation {0}")]
    PlusOneAlreadyUsed(ReservationId),

    #[error("Reservation {0} belongs to another requester")]
    Forbidden(ReservationId),

    #[error("Reservation {0} belongs to another club")]
    ClubScopeMismatch(ReservationId),

    #[error("Layout lookup failed: {0:#}")]
    Lookup(anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Engine Result type
pub type EngineResult<T> = Result<T, BookingError>;

impl BookingError {
    /// Unified error code
    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::NotFound(_) => ErrorCode::NotFound,
            BookingError::Validation(_) => ErrorCode::ValidationFailed,
            BookingError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            BookingError::TableNotAvailable { .. } => ErrorCode::TableNotAvailable,
            BookingError::IdempotencyConflict => ErrorCode::IdempotencyConflict,
            BookingError::HoldExpired(_) => ErrorCode::HoldExpired,
            BookingError::InvalidState { .. } => ErrorCode::InvalidState,
            BookingError::LatePlusOneExpired(_) => ErrorCode::LatePlusOneExpired,
            BookingError::PlusOneAlreadyUsed(_) => ErrorCode::PlusOneAlreadyUsed,
            BookingError::Forbidden(_) => ErrorCode::PermissionDenied,
            BookingError::ClubScopeMismatch(_) => ErrorCode::ClubScopeMismatch,
            BookingError::Lookup(_) | BookingError::Serialization(_) => ErrorCode::InternalError,
        }
    }

    /// Wire name of the error
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            BookingError::TableNotAvailable { .. } => "TABLE_NOT_AVAILABLE",
            BookingError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            BookingError::HoldExpired(_) => "HOLD_EXPIRED",
            BookingError::InvalidState { .. } => "INVALID_STATE",
            BookingError::LatePlusOneExpired(_) => "LATE_PLUS_ONE_EXPIRED",
            BookingError::PlusOneAlreadyUsed(_) => "PLUS_ONE_ALREADY_USED",
            BookingError::Forbidden(_) => "FORBIDDEN",
            BookingError::ClubScopeMismatch(_) => "CLUB_SCOPE_MISMATCH",
            BookingError::Lookup(_) | BookingError::Serialization(_) => "INTERNAL_ERROR",
        }
    }

    /// Error envelope for a transport layer
    pub fn into_response<T>(self) -> ApiResponse<T> {
        ApiResponse::error(&AppError::from(self))
    }

    /// Expected business outcome (as opposed to an unexpected failure)
    pub fn is_business(&self) -> bool {
        !matches!(
            self,
            BookingError::Lookup(_) | BookingError::Serialization(_)
        )
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let code = err.code();
        if code.category() == ErrorCategory::System {
            tracing::error!(error = %err, "Booking engine internal error");
            return AppError::new(code);
        }
        let reason = err.as_str();
        let app = match err {
            BookingError::Validation(msg) => AppError::validation(msg),
            BookingError::NotFound(what) => AppError::not_found(what),
            other => AppError::with_message(code, other.to_string()),
        };
        app.with_detail("reason", reason)
    }
}
