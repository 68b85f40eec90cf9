//! Boot the storefront and admin routers on random local ports.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use duka_storefront::config::{PaymentPollConfig, SentryConfig, StorefrontConfig};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, redirect};
use secrecy::SecretString;
use tokio::net::TcpListener;

use crate::mock_api::MockApi;

/// Poll interval used by test storefronts.
pub const PAYMENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const SESSION_SECRET: &str = "integration-test-session-secret-with-enough-entropy-0123456789";

/// A running app and a cookie-keeping browser for it.
///
/// Redirects are not followed so tests can assert on `Location`.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
}

impl TestServer {
    fn new(addr: SocketAddr) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: format!("http://{addr}"),
            client,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(self.client.get(self.url(path))).await
    }

    /// GET as HTMX would send it.
    pub async fn hx_get(&self, path: &str) -> Response {
        self.send(self.client.get(self.url(path)).header("HX-Request", "true"))
            .await
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.send(self.client.post(self.url(path)).form(form)).await
    }

    /// Form POST as HTMX would send it.
    pub async fn hx_post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.send(
            self.client
                .post(self.url(path))
                .header("HX-Request", "true")
                .form(form),
        )
        .await
    }

    /// Multipart POST with one file under `field`.
    pub async fn post_file(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Response {
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .expect("Failed to set part content type");
        let form = Form::new().part(field.to_string(), part);
        self.send(self.client.post(self.url(path)).multipart(form))
            .await
    }

    /// Multipart POST with text fields and an optional `file` part of
    /// `(file_name, content_type, bytes)`.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Response {
        let mut form = fields.iter().fold(Form::new(), |form, (name, value)| {
            form.text((*name).to_string(), (*value).to_string())
        });
        if let Some((file_name, content_type, bytes)) = file {
            let part = Part::bytes(bytes.to_vec())
                .file_name(file_name.to_string())
                .mime_str(content_type)
                .expect("Failed to set part content type");
            form = form.part("file", part);
        }
        self.send(self.client.post(self.url(path)).multipart(form))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Response {
        request.send().await.expect("Request to test server failed")
    }
}

/// `Location` of a redirect response.
#[must_use]
pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read test server address");
    (listener, addr)
}

/// Start a storefront that talks to `api`.
pub async fn spawn_storefront(api: &MockApi) -> TestServer {
    spawn_storefront_with(api, |_| {}).await
}

/// Start a storefront, adjusting its settings first.
pub async fn spawn_storefront_with(api: &MockApi, customize: impl FnOnce(&mut StorefrontConfig)) -> TestServer {
    let (listener, addr) = bind().await;
    let mut config = StorefrontConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: addr.port(),
        base_url: format!("http://{addr}"),
        session_secret: SecretString::from(SESSION_SECRET),
        api: api.config(),
        assistant: None,
        payment: PaymentPollConfig {
            interval: PAYMENT_POLL_INTERVAL,
            timeout: Duration::from_secs(30),
        },
        sentry: SentryConfig::default(),
    };
    customize(&mut config);
    let state = duka_storefront::state::AppState::new(config)
        .expect("Failed to build storefront state");
    let app = duka_storefront::app(state);

    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    TestServer::new(addr)
}

/// Start an admin panel that talks to `api`.
pub async fn spawn_admin(api: &MockApi) -> TestServer {
    let (listener, addr) = bind().await;
    let config = duka_admin::config::AdminConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: addr.port(),
        base_url: format!("http://{addr}"),
        session_secret: SecretString::from(SESSION_SECRET),
        api: api.config(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    };
    let state = duka_admin::state::AppState::new(config).expect("Failed to build admin state");
    let app = duka_admin::app(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestServer::new(addr)
}
