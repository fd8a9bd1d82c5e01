use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use bioreactor_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors, carries relayed node error
/// payloads, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bioreactor_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error payload relayed from the node service, re-emitted with
    /// the matching HTTP status.
    #[error("Node error ({code}): {message}")]
    Node { code: String, message: String },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Build from the node's `{ "error", "code" }` error envelope.
    pub fn from_node_payload(payload: &Value) -> Self {
        let code = payload
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("NODE_ERROR")
            .to_string();
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("node reported an error")
            .to_string();
        Self::Node { code, message }
    }
}

/// Map a relayed node error code back to the status the node used.
///
/// Unknown codes fall back to 502: the upstream reported something this
/// hub build does not recognize.
fn node_code_status(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
        "CONFLICT" => StatusCode::CONFLICT,
        "HARDWARE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        "HARDWARE_FAULT" | "RUNTIME_ERROR" | "INTERNAL_ERROR" => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        "TRANSPORT_ERROR" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND".to_string(),
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR".to_string(),
                    msg.clone(),
                ),
                CoreError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT".to_string(), msg.clone())
                }
                CoreError::Transport(msg) => {
                    tracing::error!(error = %msg, "Node transport error");
                    (
                        StatusCode::BAD_GATEWAY,
                        "TRANSPORT_ERROR".to_string(),
                        msg.clone(),
                    )
                }
                CoreError::Runtime(msg) => {
                    tracing::error!(error = %msg, "Node runtime error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RUNTIME_ERROR".to_string(),
                        msg.clone(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR".to_string(),
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Relayed node errors ---
            AppError::Node { code, message } => {
                (node_code_status(code), code.clone(), message.clone())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST".to_string(),
                msg.clone(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR".to_string(),
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
