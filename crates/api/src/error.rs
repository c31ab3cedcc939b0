//! HTTP error mapping.
//!
//! Every failure leaving a handler renders as the same JSON envelope,
//! `{"error": <message>, "code": <CODE>}`, where `code` is a stable
//! machine-readable string clients can switch on. Domain errors carry
//! their own message onto the wire; internal failures are logged
//! server-side and replaced with a generic body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use showrun_core::error::CoreError;

/// Error type returned by every handler in this crate.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Failures raised by the engine or core validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request whose shape parses but whose parameters are out of
    /// bounds, e.g. a `wait_ms` exceeding the request timeout.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Handler result alias; `Ok` values must implement [`IntoResponse`].
pub type AppResult<T> = Result<T, AppError>;

/// Map a domain error onto HTTP status, stable code, and wire message.
///
/// `Internal` messages never reach the client.
fn core_error_parts(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} '{id}' not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error reached a handler");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => core_error_parts(core),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}
