//! Subcommand implementations.

pub mod payment;
pub mod seed;

use duka_api_client::{AccessToken, ApiClient, ApiConfig, ApiError};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error(transparent)]
    Config(#[from] duka_api_client::ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The payment did not go through.
    #[error("Payment for order {order_id} did not complete: {reason}")]
    PaymentFailed { order_id: i64, reason: String },
}

/// API client logged in as the configured staff account.
pub struct Session {
    pub client: ApiClient,
    pub token: AccessToken,
}

/// Log in with `DUKA_API_EMAIL` and `DUKA_API_PASSWORD`.
///
/// # Errors
///
/// Returns an error if a variable is missing or the API refuses the login.
pub async fn login() -> Result<Session, CliError> {
    dotenvy::dotenv().ok();

    let email =
        std::env::var("DUKA_API_EMAIL").map_err(|_| CliError::MissingEnvVar("DUKA_API_EMAIL"))?;
    let password = std::env::var("DUKA_API_PASSWORD")
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("DUKA_API_PASSWORD"))?;

    let config = ApiConfig::from_env()?;
    let client = ApiClient::new(&config)?;

    tracing::info!(api = %config.base_url, email = %email, "Logging in");
    let login = client.login(&email, &password).await?;
    if !login.user_role.is_admin() {
        tracing::warn!(role = %login.user_role, "Account is not staff; writes will be refused");
    }

    Ok(Session {
        client,
        token: login.access_token,
    })
}
