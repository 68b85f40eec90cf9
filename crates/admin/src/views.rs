//! Shared view models for admin templates.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use duka_api_client::Paginated;
use tower_sessions::Session;

use crate::models::{CurrentAdmin, Flash, session_keys, take_flashes};

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub is_super_admin: bool,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.username.clone(),
            email: admin.email.clone(),
            is_super_admin: admin.is_super_admin(),
        }
    }
}

/// Header, navigation and notices for every page.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub admin_user: Option<AdminUserView>,
    pub current_path: String,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    /// Whether `prefix` is the active section, for nav highlighting.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.current_path == "/"
        } else {
            self.current_path.starts_with(prefix)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current_path = parts.uri.path().to_string();
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self {
                current_path,
                ..Self::default()
            });
        };

        let admin_user = session
            .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
            .await
            .ok()
            .flatten()
            .map(|admin| AdminUserView::from(&admin));

        Ok(Self {
            admin_user,
            current_path,
            flashes: take_flashes(session).await,
        })
    }
}

/// Whether the request came from HTMX.
pub struct HxRequest(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for HxRequest {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(crate::middleware::auth::is_htmx(parts)))
    }
}

/// Previous/next links for a paginated table.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Pagination {
    #[must_use]
    pub fn new<T>(result: &Paginated<T>, link: impl Fn(u32) -> String) -> Self {
        Self {
            page: result.page,
            pages: result.pages.max(1),
            total: result.total,
            prev_url: result.has_previous().then(|| link(result.page - 1)),
            next_url: result.has_next().then(|| link(result.page + 1)),
        }
    }
}

/// Query string from the present pairs, e.g. `?search=tv&page=2`.
#[must_use]
pub fn query_string(pairs: &[(&str, Option<String>)]) -> String {
    let parts: Vec<String> = pairs
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

/// Blank form inputs become `None`.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
