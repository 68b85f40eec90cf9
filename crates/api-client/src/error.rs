//! Errors returned by [`ApiClient`](crate::ApiClient).

use reqwest::StatusCode;
use thiserror::Error;

/// Detail string the API uses when a bearer token has expired.
const TOKEN_EXPIRED_DETAIL: &str = "Token has expired";

/// Errors that can occur when talking to the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: connect, timeout, TLS, body read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status and, usually, a `detail`.
    #[error("API error {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// The `detail` field of the error body, or a fallback.
        detail: String,
    },

    /// Missing, invalid or expired credentials (401) or forbidden (403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Too many requests; retry after the given number of seconds.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl ApiError {
    /// Build the error for a non-success response.
    pub(crate) fn from_status(status: StatusCode, detail: Option<String>) -> Self {
        let detail = detail.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        });
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            _ if detail == TOKEN_EXPIRED_DETAIL => Self::Unauthorized(detail),
            _ => Self::Status { status, detail },
        }
    }

    /// Whether the customer needs to log in again.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Message safe to show to a customer.
    ///
    /// API `detail` strings are written for end users and pass through;
    /// transport and parse failures collapse to a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(detail) if detail == TOKEN_EXPIRED_DETAIL => {
                "Your session has expired. Please log in again.".to_string()
            }
            Self::Status { detail, .. } | Self::Unauthorized(detail) | Self::NotFound(detail) => {
                detail.clone()
            }
            Self::RateLimited(_) => "Too many requests. Please wait a moment and try again.".to_string(),
            Self::Http(_) | Self::Parse(_) => {
                "We couldn't reach the store right now. Please try again.".to_string()
            }
        }
    }
}
