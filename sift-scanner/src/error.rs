//! Error types for sift-scanner
//!
//! Two error tiers with different blast radii:
//! - [`ScanError`]: list-level failures that abort a scan
//! - [`TrackError`]: per-track failures swallowed at the track boundary
//!
//! plus [`ApiError`] for the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// List-level scan errors. Any of these aborts the scan and surfaces a
/// user-facing message; none of them may leave partial results behind from
/// the track-loading phase.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Token refresh failed; the user has to sign in again
    #[error("Session expired. Please sign in again.")]
    AuthExpired,

    /// Rate limit retry budget exhausted, or the provider asked for a wait
    /// beyond the retry ceiling
    #[error("Rate limited by the provider: try again in {wait_estimate}.")]
    RateLimited { wait_estimate: String },

    /// Any other non-2xx provider response
    #[error("Provider API error: HTTP {0}")]
    UpstreamHttp(u16),

    /// Transport-level failure (DNS, connect, body read)
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Network(err.to_string())
    }
}

/// Per-track errors. Caught, logged, and downgraded to "no score obtained";
/// one bad preview never aborts the whole scan.
#[derive(Debug, Error)]
pub enum TrackError {
    /// No preview, no fallback hit, no capture device
    #[error("No audio source available")]
    AudioUnavailable,

    /// Preview bytes could not be decoded to a sample buffer
    #[error("Audio decode failed: {0}")]
    AudioDecodeFailed(String),

    /// Classifier session or run failure
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

/// API error type for the HTTP surface
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., scan already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Provider session expired and refresh failed (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Provider rate limit exhausted (429)
    #[error("Rate limited: {0}")]
    TooManyRequests(String),

    /// Proxy target host not on the audio-CDN allowlist (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Upstream fetch failed while proxying (502)
    #[error("Upstream fetch failed: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "AUTH_EXPIRED", msg),
            ApiError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg)
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
