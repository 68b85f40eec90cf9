//! Application state shared across handlers.

use std::sync::Arc;

use duka_api_client::{ApiClient, ApiError, PaymentPoller};

use crate::assistant::{AssistantClient, AssistantError};
use crate::config::StorefrontConfig;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("commerce API client: {0}")]
    Api(#[from] ApiError),
    #[error("shopping assistant client: {0}")]
    Assistant(#[from] AssistantError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    poller: PaymentPoller,
    assistant: Option<AssistantClient>,
}

impl AppState {
    /// Build the API clients described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.api)?;
        let poller = PaymentPoller::new(api.clone())
            .with_interval(config.payment.interval)
            .with_timeout(config.payment.timeout);
        let assistant = config
            .assistant
            .as_ref()
            .map(AssistantClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                poller,
                assistant,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The commerce API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// M-Pesa payment status checks.
    #[must_use]
    pub fn poller(&self) -> &PaymentPoller {
        &self.inner.poller
    }

    /// The shopping assistant, if configured.
    #[must_use]
    pub fn assistant(&self) -> Option<&AssistantClient> {
        self.inner.assistant.as_ref()
    }
}
