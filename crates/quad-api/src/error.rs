use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use quad_core::CoreError;

/// HTTP-facing error surface. Every failure renders as one
/// human-readable `{ "error": ... }` body; nothing fails silently.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(CoreError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Core(CoreError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Core(CoreError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Database(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shorthand for join failures from `spawn_blocking`.
pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", e);
    ApiError::Internal(anyhow::anyhow!("task join error: {}", e))
}
