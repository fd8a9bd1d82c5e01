use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use bioreactor_core::error::CoreError;

use crate::hardware::HardwareError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bioreactor_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A hardware access error.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Transport(msg) => {
                    (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR", msg.clone())
                }
                CoreError::Runtime(msg) => {
                    tracing::error!(error = %msg, "Container runtime error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RUNTIME_ERROR",
                        msg.clone(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Hardware errors ---
            AppError::Hardware(err) => match err {
                HardwareError::Unavailable(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "HARDWARE_UNAVAILABLE",
                    msg.clone(),
                ),
                HardwareError::Fault(msg) => {
                    tracing::error!(error = %msg, "Hardware fault");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "HARDWARE_FAULT",
                        msg.clone(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
