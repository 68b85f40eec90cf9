//! Connection settings for the remote API.
//!
//! # Environment Variables
//!
//! - `DUKA_API_BASE_URL` - Base URL of the REST API (required)
//! - `DUKA_API_TIMEOUT_SECS` - Per-request timeout in seconds (default: 15)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Errors loading [`ApiConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where the API lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are appended to it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Build a config for `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Load from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DUKA_API_BASE_URL` is missing or invalid, or the
    /// timeout is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("DUKA_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DUKA_API_BASE_URL".to_string()))?;

        let timeout_secs = match std::env::var("DUKA_API_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "DUKA_API_TIMEOUT_SECS".to_string(),
                        format!("expected a positive number of seconds, got {raw:?}"),
                    )
                })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: parse_base_url(&base_url)?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Same config with a different timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("DUKA_API_BASE_URL".to_string(), reason);

    // A trailing slash makes `Url::join` append instead of replacing the last segment.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_trailing_slash() {
        let config = ApiConfig::new("http://127.0.0.1:8000/api").unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8000/api/");
        assert_eq!(
            config.base_url.join("public/products").unwrap().as_str(),
            "http://127.0.0.1:8000/api/public/products"
        );
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(ApiConfig::new("not a url").is_err());
        assert!(ApiConfig::new("ftp://files.example.com").is_err());
    }

    #[test]
    fn test_with_timeout() {
        let config = ApiConfig::new("https://api.example.com")
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
