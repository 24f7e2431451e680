use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Vision API authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Vision API quota exhausted: {0}")]
    UpstreamQuota(String),

    #[error("Vision model not found: {0}")]
    UpstreamNotFound(String),

    #[error("Vision API rate limit exceeded, retry after {retry_after:?} seconds")]
    UpstreamRateLimited { retry_after: Option<u64> },

    #[error("Vision API server error, retry later: {0}")]
    UpstreamServer(String),

    #[error("Vision API request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Vision API request failed: {0}")]
    UpstreamTransport(String),

    #[error("Storage connection error: {0}")]
    StorageConnect(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SnapError {
    /// HTTP status this error surfaces as at the request boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            SnapError::UnsupportedFormat(_)
            | SnapError::PayloadTooLarge { .. }
            | SnapError::Validation(_)
            | SnapError::Json(_) => StatusCode::BAD_REQUEST,
            SnapError::NotFound(_) | SnapError::UpstreamNotFound(_) => StatusCode::NOT_FOUND,
            SnapError::RateLimited { .. } | SnapError::UpstreamRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            SnapError::UpstreamAuth(_) => StatusCode::UNAUTHORIZED,
            SnapError::UpstreamQuota(_) => StatusCode::PAYMENT_REQUIRED,
            SnapError::UpstreamServer(_) | SnapError::UpstreamTransport(_) => {
                StatusCode::BAD_GATEWAY
            }
            SnapError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SnapError::StorageConnect(_)
            | SnapError::StorageWrite(_)
            | SnapError::Database(_)
            | SnapError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Seconds a caller should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SnapError::RateLimited { retry_after } => Some(*retry_after),
            SnapError::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl IntoResponse for SnapError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal classes are logged with full detail and surfaced generically.
        let message = match &self {
            internal @ (SnapError::Database(_)
            | SnapError::StorageConnect(_)
            | SnapError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error mapped to response");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response();

        if let Some(secs) = self.retry_after() {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;
