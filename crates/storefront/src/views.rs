//! Shared view models for templates.
//!
//! Templates only see flat, pre-formatted data; prices arrive as
//! `Ksh 1,250` strings and optional bits are already resolved.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use duka_api_client::{Banner, Paginated, Product};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, Flash, session_keys, take_flashes};
use crate::models::session::load_cart;
use crate::state::AppState;

/// Data every full page needs for the header and notices.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub username: Option<String>,
    pub cart_count: u32,
    pub flashes: Vec<Flash>,
    pub assistant_enabled: bool,
}

impl PageContext {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let assistant_enabled = state.assistant().is_some();
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self {
                assistant_enabled,
                ..Self::default()
            });
        };

        let username = session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten()
            .map(|c| c.username);
        let cart_count = load_cart(session)
            .await
            .map(|cart| cart.total_quantity())
            .unwrap_or(0);
        let flashes = take_flashes(session).await;

        Ok(Self {
            username,
            cart_count,
            flashes,
            assistant_enabled,
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

/// A promotional banner.
#[derive(Debug, Clone)]
pub struct BannerView {
    pub image_url: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub button_text: Option<String>,
}

impl BannerView {
    /// Banners worth showing; ones whose image was removed are skipped.
    #[must_use]
    pub fn list(banners: &[Banner]) -> Vec<Self> {
        banners
            .iter()
            .filter(|b| b.active && !b.image_url.trim().is_empty())
            .map(|b| Self {
                image_url: b.image_url.clone(),
                title: b.title.clone().filter(|t| !t.trim().is_empty()),
                subtitle: b.subtitle.clone().filter(|t| !t.trim().is_empty()),
                button_text: b.button_text.clone().filter(|t| !t.trim().is_empty()),
            })
            .collect()
    }
}

/// A product tile in listings.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub discount: Option<String>,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub is_new: bool,
    pub specs: String,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            brand: product.brand.clone().filter(|b| !b.trim().is_empty()),
            price: product.price.display(),
            original_price: product
                .original_price
                .filter(|original| *original > product.price)
                .map(|original| original.display()),
            discount: (product.discount > rust_decimal::Decimal::ZERO)
                .then(|| format_percent(product.discount)),
            image_url: product.primary_image().map(str::to_string),
            in_stock: product.in_stock(),
            is_new: product.is_new,
            specs: product.spec_summary(),
        }
    }
}

/// `15%`, `12.5%`.
#[must_use]
pub fn format_percent(value: rust_decimal::Decimal) -> String {
    format!("{}%", value.normalize())
}

/// Previous/next links for a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Pagination {
    /// `link(page)` builds the URL for another page.
    #[must_use]
    pub fn new<T>(result: &Paginated<T>, link: impl Fn(u32) -> String) -> Self {
        Self {
            page: result.page,
            pages: result.pages.max(1),
            prev_url: result.has_previous().then(|| link(result.page - 1)),
            next_url: result.has_next().then(|| link(result.page + 1)),
        }
    }

    #[must_use]
    pub const fn is_needed(&self) -> bool {
        self.pages > 1
    }
}

/// Build a query string from present pairs, e.g. `?search=tv&page=2`.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_query_string_skips_empty() {
        assert_eq!(query_string(&[]), "");
        assert_eq!(
            query_string(&[
                ("search", Some("tv stand".to_string())),
                ("category", None),
                ("page", Some("2".to_string())),
                ("status", Some(String::new())),
            ]),
            "?search=tv%20stand&page=2"
        );
    }

    #[test]
    fn test_pagination_from_page_result() {
        let result = Paginated::<u8> {
            items: vec![],
            total: 30,
            page: 2,
            limit: 8,
            pages: 4,
        };
        let pagination = Pagination::new(&result, |p| format!("/store?page={p}"));
        assert_eq!(pagination.prev_url.as_deref(), Some("/store?page=1"));
        assert_eq!(pagination.next_url.as_deref(), Some("/store?page=3"));
        assert!(pagination.is_needed());
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Decimal::from(15)), "15%");
        assert_eq!(format_percent(Decimal::from_str("12.50").unwrap()), "12.5%");
    }
}
