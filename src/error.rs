use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The class does not exist.
    #[error("class not found")]
    ClassNotFound,
    /// The booking does not exist.
    #[error("booking not found")]
    BookingNotFound,
    /// The user already holds a seat in this class.
    #[error("user already booked in this class")]
    DuplicateBooking,
    /// The class has no free seats left.
    #[error("class is full: {remaining} seat(s) remaining")]
    CapacityExceeded { remaining: u32 },
    /// The user is barred from booking until the next amnesty.
    #[error("user is blacklisted after repeated late cancellations")]
    UserBlacklisted,
    /// The user is already queued for this class.
    #[error("user already on the waitlist for this class")]
    AlreadyWaitlisted,
    /// The user asked to queue for a class they are booked in.
    #[error("user already holds a seat in this class")]
    AlreadyBooked,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller may not perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// No free seats in the class.
    #[error("class is full: {remaining} seat(s) remaining")]
    ClassFull { remaining: u32 },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::ClassNotFound => AppError::NotFound("class not found".into()),
            ServiceError::BookingNotFound => AppError::NotFound("booking not found".into()),
            ServiceError::DuplicateBooking => {
                AppError::Conflict("user already booked in this class".into())
            }
            ServiceError::CapacityExceeded { remaining } => AppError::ClassFull { remaining },
            ServiceError::UserBlacklisted => {
                AppError::Forbidden("user is blacklisted after repeated late cancellations".into())
            }
            ServiceError::AlreadyWaitlisted => {
                AppError::Conflict("user already on the waitlist for this class".into())
            }
            ServiceError::AlreadyBooked => {
                AppError::Conflict("user already holds a seat in this class".into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_slots: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::ClassFull { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (code, remaining_slots) = match &self {
            AppError::ClassFull { remaining } => (Some("CAPACITY_EXCEEDED"), Some(*remaining)),
            AppError::Forbidden(_) => (Some("USER_BLACKLISTED"), None),
            _ => (None, None),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            code,
            remaining_slots,
        });

        (status, payload).into_response()
    }
}
