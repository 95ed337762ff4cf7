//! Service error types with HTTP status code mapping.
//!
//! [`SyncError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "storage write failed: connection refused",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Central error enum for the sync service.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | Upstream source | 502 Bad Gateway            |
/// | 3000–3999 | Storage/Server  | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The external dataset could not be reached (network failure,
    /// timeout, or non-2xx HTTP response).
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The external dataset responded but the payload could not be
    /// parsed into the expected JSON shape.
    #[error("source payload malformed: {0}")]
    SourceMalformed(String),

    /// A batch upsert or job mutation failed at the storage layer.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// A status or health query failed at the storage layer.
    #[error("storage read failed: {0}")]
    StorageRead(String),

    /// A cron expression, timezone, or other configuration value is
    /// invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::SourceUnavailable(_) => 2001,
            Self::SourceMalformed(_) => 2002,
            Self::StorageWrite(_) => 3001,
            Self::StorageRead(_) => 3002,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::SourceUnavailable(_) | Self::SourceMalformed(_) => StatusCode::BAD_GATEWAY,
            Self::StorageWrite(_) | Self::StorageRead(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
