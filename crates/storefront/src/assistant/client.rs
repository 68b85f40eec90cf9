//! Chat completion client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{instrument, warn};
use url::Url;

use crate::config::AssistantConfig;

use super::error::AssistantError;
use super::types::{ChatMessage, CompletionRequest, CompletionResponse, ErrorEnvelope};

/// Persona and tone for every conversation.
pub const SYSTEM_PROMPT: &str = "You are Makena, a friendly, helpful shopping assistant for an e-commerce site. Always be helpful, concise, and positive.";

/// Shown instead of an answer when the completion call fails.
pub const APOLOGY: &str = "Sorry, I couldn't get a response from OpenAI.";

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct AssistantClient {
    inner: Arc<AssistantClientInner>,
}

struct AssistantClientInner {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl AssistantClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|_| AssistantError::InvalidKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("v1/chat/completions")
            .map_err(|e| AssistantError::Parse(format!("Invalid endpoint: {e}")))?;

        Ok(Self {
            inner: Arc::new(AssistantClientInner {
                client,
                endpoint,
                model: config.model.clone(),
            }),
        })
    }

    /// Ask one question and return the model's reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with an error,
    /// or the reply is empty.
    #[instrument(skip(self, prompt), fields(model = %self.inner.model))]
    pub async fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
        let request = CompletionRequest {
            model: self.inner.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let body = response.text().await?;
        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AssistantError::Parse(format!("Failed to parse response: {e}")))?;
        completion
            .first_text()
            .map(str::to_string)
            .ok_or(AssistantError::Empty)
    }

    /// Like [`complete`](Self::complete), but any failure becomes [`APOLOGY`].
    pub async fn answer(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Shopping assistant request failed");
                APOLOGY.to_string()
            }
        }
    }
}

/// Question asked from a product page.
#[must_use]
pub fn product_prompt(product_name: &str, details: Option<&str>, question: &str) -> String {
    let details = details
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| format!(" Details: {d}"))
        .unwrap_or_default();
    format!(
        "The customer is looking at \"{product_name}\".{details}\nCustomer question: {}",
        question.trim()
    )
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> AssistantError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return AssistantError::RateLimited(retry_after);
    }

    if status == StatusCode::UNAUTHORIZED {
        return AssistantError::Unauthorized("Invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => AssistantError::Api {
                error_type: envelope
                    .error
                    .error_type
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: envelope.error.message,
            },
            Err(_) => AssistantError::Api {
                error_type: status.as_u16().to_string(),
                message: body,
            },
        },
        Err(e) => AssistantError::Http(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(base: &str) -> AssistantConfig {
        AssistantConfig {
            api_key: SecretString::from("sk-test-123"),
            base_url: Url::parse(base).unwrap(),
            model: "gpt-4o".to_string(),
        }
    }

    #[test]
    fn test_endpoint_joins_onto_base_path() {
        let client = AssistantClient::new(&config("https://api.openai.com")).unwrap();
        assert_eq!(
            client.inner.endpoint.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );

        let client = AssistantClient::new(&config("http://127.0.0.1:9000/proxy")).unwrap();
        assert_eq!(
            client.inner.endpoint.as_str(),
            "http://127.0.0.1:9000/proxy/v1/chat/completions"
        );
    }

    #[test]
    fn test_product_prompt() {
        let prompt = product_prompt("Oraimo Earbuds", Some(" Battery: 30h "), "Are they waterproof? ");
        assert_eq!(
            prompt,
            "The customer is looking at \"Oraimo Earbuds\". Details: Battery: 30h\nCustomer question: Are they waterproof?"
        );

        let prompt = product_prompt("Kettle", Some("  "), "Price?");
        assert_eq!(
            prompt,
            "The customer is looking at \"Kettle\".\nCustomer question: Price?"
        );
    }
}
