//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping booking rejections and store failures to HTTP status
//! codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use seatline_booking::BookingError;
use seatline_core::error::SeatlineError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters, or a rule rejection.
    BadRequest(String),
    /// 401 Unauthorized - missing or invalid identity.
    Unauthorized(String),
    /// 403 Forbidden - the caller's role may not use this operation.
    Forbidden(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - the resource is in a state that rejects the request.
    Conflict(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                error!("Internal API error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SeatlineError> for ApiError {
    fn from(err: SeatlineError) -> Self {
        match &err {
            SeatlineError::NotFound(msg) => ApiError::NotFound(format!("Not found: {}", msg)),
            SeatlineError::Config(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::Storage(inner) => inner.into(),
            BookingError::NotAuthorized(_) => ApiError::Forbidden(message),
            BookingError::TableNotFound(_)
            | BookingError::ReservationNotFound
            | BookingError::NotOccupied
            | BookingError::NotQueued => ApiError::NotFound(message),
            BookingError::TableUnavailable
            | BookingError::TableConflict
            | BookingError::CustomerConflict
            | BookingError::AlreadyQueued
            | BookingError::QueueFull(_)
            | BookingError::InvalidTransition(..) => ApiError::Conflict(message),
            _ => ApiError::BadRequest(message),
        }
    }
}
