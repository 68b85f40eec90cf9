//! Error types for the shopping assistant client.

use thiserror::Error;

/// Errors that can occur when asking the assistant.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion API returned an error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response contained no text.
    #[error("empty completion")]
    Empty,

    /// The API key cannot be sent as a header.
    #[error("invalid API key")]
    InvalidKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_error_display() {
        assert_eq!(
            AssistantError::RateLimited(20).to_string(),
            "rate limited, retry after 20 seconds"
        );
        let err = AssistantError::Api {
            error_type: "invalid_request_error".to_string(),
            message: "max_tokens is too large".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (invalid_request_error): max_tokens is too large"
        );
    }
}
