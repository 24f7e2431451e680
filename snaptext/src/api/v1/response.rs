//! # V1 API Response Envelope
//!
//! Canonical wire format for all v1 endpoints:
//!
//! ```json
//! { "success": true,  "data": { ... } }
//! { "success": false, "error": "Extraction abc123 not found" }
//! ```
//!
//! Exactly one of `data`/`error` is present. The HTTP status is derived
//! from the originating [`SnapError`] on failure; rate-limited responses
//! additionally carry a `Retry-After` header.
//!
//! Record ids are nanoids, 21 characters (e.g. `"V1StGXR8_Z5jdHi6B-myT"`).

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::SnapError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    /// The response payload. Present on success, absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable error message. Present on error, absent on success.
    /// Internal implementation details are never included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// HTTP status to use in the response. Not serialized on the wire.
    #[serde(skip, default = "default_status")]
    status: StatusCode,
    /// `Retry-After` seconds for throttled responses. Not serialized.
    #[serde(skip)]
    retry_after: Option<u64>,
}

fn default_status() -> StatusCode {
    StatusCode::OK
}

impl<T: Serialize> ApiResponse<T> {
    /// Success response with data (HTTP 200).
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: StatusCode::OK,
            retry_after: None,
        }
    }

    /// Resource created response (HTTP 201).
    pub fn created(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: StatusCode::CREATED,
            retry_after: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            status,
            retry_after: None,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        let retry_after = self.retry_after;

        let mut response = match serde_json::to_value(&self) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(_) => {
                let body = serde_json::json!({
                    "success": false,
                    "error": "An internal error occurred"
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        };

        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl<T: Serialize> From<SnapError> for ApiResponse<T> {
    /// Convert a [`SnapError`] into a v1 envelope. Internal error details
    /// are logged and replaced with a generic message; every other class
    /// surfaces its own description.
    fn from(err: SnapError) -> Self {
        let status = err.status();
        let retry_after = err.retry_after();

        let message = match &err {
            internal @ (SnapError::Database(_)
            | SnapError::StorageConnect(_)
            | SnapError::Json(_)
            | SnapError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error mapped to v1 response");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        Self {
            success: false,
            data: None,
            error: Some(message),
            status,
            retry_after,
        }
    }
}
