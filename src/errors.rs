use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Error kinds surfaced by the aggregation core, the location canonicaliser,
/// and the HTTP layer above them.
///
/// `CacheError` is constructed in places that need to carry a cache failure
/// through a `Result` signature, but by design it is never sent to
/// `IntoResponse` — callers log it and recover locally (see `crate::cache`).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("could not resolve location: {0}")]
    GeocodeFailed(String),

    #[error("record store error: {0}")]
    RecordStoreError(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("{0}")]
    UpstreamUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::GeocodeFailed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::RecordStoreError(err) => {
                tracing::error!("record store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
            AppError::CacheError(msg) => {
                // Should never actually reach here — cache errors are recovered
                // at the call site. Kept as a safety net, not a happy path.
                tracing::error!("cache error reached the HTTP layer: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
            AppError::UpstreamUnavailable(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError(err.to_string())
    }
}
