//! Authentication extractors.
//!
//! Customers authenticate against the commerce API; the storefront keeps the
//! resulting bearer token in the session.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Extractor that requires a logged-in customer.
///
/// Page loads are redirected to the login page with a `next` parameter;
/// HTMX requests get `HX-Redirect` so the whole page navigates.
///
/// ```rust,ignore
/// async fn orders(RequireAuth(customer): RequireAuth) -> impl IntoResponse {
///     format!("Orders for {}", customer.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Rejection for [`RequireAuth`].
pub enum AuthRejection {
    /// Plain page load.
    RedirectToLogin(String),
    /// HTMX request.
    HxRedirectToLogin(String),
    /// No session layer.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::HxRedirectToLogin(location) => {
                (StatusCode::UNAUTHORIZED, [("HX-Redirect", location)]).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Login URL that returns to `path` afterwards.
#[must_use]
pub fn login_url(path: &str) -> String {
    if path == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?next={}", urlencoding::encode(path))
    }
}

/// Whether the request was issued by HTMX.
#[must_use]
pub fn is_htmx(parts: &Parts) -> bool {
    parts.headers.contains_key("hx-request")
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let customer: Option<CurrentCustomer> = session
            .get(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten();

        customer.map(Self).ok_or_else(|| {
            // HTMX fragments should send the customer back to the page, not the fragment
            let return_to = if is_htmx(parts) {
                parts
                    .headers
                    .get("hx-current-url")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|u| url::Url::parse(u).ok())
                    .map_or_else(|| "/".to_string(), |u| u.path().to_string())
            } else {
                parts.uri.path().to_string()
            };
            let location = login_url(&return_to);
            if is_htmx(parts) {
                AuthRejection::HxRedirectToLogin(location)
            } else {
                AuthRejection::RedirectToLogin(location)
            }
        })
    }
}

/// Extractor that optionally gets the current customer.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(customer))
    }
}

/// Store the logged-in customer, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Forget the customer and anything tied to their account (logout).
///
/// The cart stays with the browser.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::PENDING_PAYMENT)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::CONFIRMATION)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/"), "/auth/login");
        assert_eq!(login_url("/checkout"), "/auth/login?next=%2Fcheckout");
        assert_eq!(login_url("/orders/12"), "/auth/login?next=%2Forders%2F12");
    }
}
