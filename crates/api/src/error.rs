use std::time::Duration;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use infergate_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Renders the `{"error": {"message", "type"}}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `infergate_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A malformed request body or form.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The HTTP backstop timeout fired before the handler finished.
    #[error("Request timed out after {}s", .0.as_secs())]
    RequestTimeout(Duration),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INVALID_REQUEST: &str = "invalid_request_error";
const SERVICE_UNAVAILABLE: &str = "service_unavailable";
const SERVER_ERROR: &str = "server_error";
const TIMEOUT_ERROR: &str = "timeout_error";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, INVALID_REQUEST, msg.clone())
                }
                CoreError::NotReady(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    SERVICE_UNAVAILABLE,
                    msg.clone(),
                ),
                CoreError::Execution { kind, message } => {
                    tracing::error!(kind = %kind, error = %message, "Job failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        SERVER_ERROR,
                        message.clone(),
                    )
                }
                CoreError::Timeout { .. } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    TIMEOUT_ERROR,
                    core.to_string(),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        SERVER_ERROR,
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, INVALID_REQUEST, msg.clone()),
            AppError::RequestTimeout(_) => {
                (StatusCode::REQUEST_TIMEOUT, TIMEOUT_ERROR, self.to_string())
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid JSON: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
