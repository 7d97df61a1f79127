//! Mapping of lifecycle errors onto HTTP responses
//!
//! Bodies are `{"error": "<message>"}`. Platform and internal failures are
//! logged with their detail and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use modelplane_common::{Conflict, Error};

/// Error returned by request handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Failure reported by the lifecycle controller or tenant resolution
    #[error(transparent)]
    Lifecycle(#[from] Error),

    /// The request body could not be parsed
    #[error("invalid request body: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Status code and client-facing message for this error
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Lifecycle(err) => match err {
                Error::Unauthenticated(_) => (
                    StatusCode::UNAUTHORIZED,
                    "Authorization header is missing".to_string(),
                ),
                Error::Conflict(Conflict::TrainingAlreadyRunning) => (
                    StatusCode::BAD_REQUEST,
                    "Training job is running".to_string(),
                ),
                Error::Conflict(Conflict::DeploymentAlreadyExists) => (
                    StatusCode::BAD_REQUEST,
                    "Deployment already exists".to_string(),
                ),
                Error::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "Deployment not found".to_string())
                }
                Error::Validation { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
                Error::Platform { .. } | Error::Config(_) | Error::Internal { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                ),
            },
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Lifecycle(err) => err.is_retryable(),
            ApiError::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, retryable = self.is_retryable(), "request failed");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
