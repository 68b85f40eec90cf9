//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Cookie signing secret (min 32 chars, high entropy)
//! - `DUKA_API_BASE_URL` - Base URL of the commerce API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `DUKA_API_TIMEOUT_SECS` - Commerce API request timeout (default: 15)
//! - `ASSISTANT_API_KEY` - Chat completion API key; the assistant is off without it
//! - `ASSISTANT_API_BASE_URL` - Chat completion host (default: <https://api.openai.com>)
//! - `ASSISTANT_MODEL` - Chat model (default: gpt-4o)
//! - `PAYMENT_POLL_INTERVAL_SECS` - Seconds between M-Pesa status checks (default: 8)
//! - `PAYMENT_POLL_TIMEOUT_SECS` - Seconds before giving up on a payment (default: 120)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag (default: development)
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use duka_api_client::ApiConfig;
use duka_core::secret::check_secret;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error(transparent)]
    Api(#[from] duka_api_client::ConfigError),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session cookie signing secret
    pub session_secret: SecretString,
    /// Commerce API connection settings
    pub api: ApiConfig,
    /// Shopping assistant, when an API key is configured
    pub assistant: Option<AssistantConfig>,
    /// M-Pesa confirmation polling
    pub payment: PaymentPollConfig,
    /// Error tracking
    pub sentry: SentryConfig,
}

/// Chat completion settings for the shopping assistant.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub base_url: Url,
    pub model: String,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

/// How often, and for how long, the payment page asks about an STK push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PaymentPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(8),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Sentry client options.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: String,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: "development".to_string(),
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// the session secret is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_signing_secret("STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            api: ApiConfig::from_env()?,
            assistant: AssistantConfig::from_env()?,
            payment: PaymentPollConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl AssistantConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("ASSISTANT_API_KEY") else {
            return Ok(None);
        };
        let raw_base = get_env_or_default("ASSISTANT_API_BASE_URL", "https://api.openai.com");
        let base_url = Url::parse(&raw_base).map_err(|e| {
            ConfigError::InvalidEnvVar("ASSISTANT_API_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model: get_env_or_default("ASSISTANT_MODEL", "gpt-4o"),
        }))
    }
}

impl PaymentPollConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval = parse_env_or_default::<u64>("PAYMENT_POLL_INTERVAL_SECS", "8")?;
        let timeout = parse_env_or_default::<u64>("PAYMENT_POLL_TIMEOUT_SECS", "120")?;
        if interval == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_INTERVAL_SECS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        if timeout < interval {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_TIMEOUT_SECS".to_string(),
                "must not be shorter than the poll interval".to_string(),
            ));
        }
        Ok(Self {
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_env_or_default("SENTRY_ENVIRONMENT", "development"),
            sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Load a cookie signing secret, refusing weak values.
fn get_signing_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    check_secret(&value)
        .map_err(|e| ConfigError::InsecureSecret(key.to_string(), e.to_string()))?;
    Ok(SecretString::from(value))
}
