//! Unified error handling for admin.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use duka_api_client::ApiError;
use thiserror::Error;

/// Where staff are sent when the API stops accepting their token.
pub const SESSION_EXPIRED_PATH: &str = "/auth/login?expired=1";

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session store read or write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Session(_) | Self::Internal(_) => true,
            Self::Api(err) => !matches!(
                err,
                ApiError::Unauthorized(_) | ApiError::NotFound(_) | ApiError::RateLimited(_)
            ),
            Self::NotFound(_) | Self::Forbidden(_) | Self::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        if let Self::Api(ApiError::Unauthorized(_)) = &self {
            return session_expired_response();
        }

        let status = match &self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(ApiError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Api(ApiError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Api(_) => StatusCode::BAD_GATEWAY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Api(ApiError::NotFound(_)) => "Not found".to_string(),
            Self::Api(err @ ApiError::RateLimited(_)) => err.user_message(),
            Self::Api(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// 401 that sends both HTMX and plain requests to the login page.
fn session_expired_response() -> Response {
    let body = format!(
        "<!doctype html><meta http-equiv=\"refresh\" content=\"0; url={SESSION_EXPIRED_PATH}\">\
         <p>Your session has expired. <a href=\"{SESSION_EXPIRED_PATH}\">Log in again</a></p>"
    );
    let mut response = (StatusCode::UNAUTHORIZED, Html(body)).into_response();
    let location = HeaderValue::from_static(SESSION_EXPIRED_PATH);
    response.headers_mut().insert("hx-redirect", location.clone());
    response.headers_mut().insert(header::LOCATION, location);
    response
}

/// The API refused the request itself, as opposed to failing.
///
/// Handlers show these to staff as a flash instead of an error page.
#[must_use]
pub fn is_rejection(error: &ApiError) -> bool {
    match error {
        ApiError::Status { status, .. } => status.is_client_error(),
        ApiError::NotFound(_) => true,
        _ => false,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a staff account.
pub fn set_sentry_user(user_id: &impl ToString, email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 123".to_string());
        assert_eq!(err.to_string(), "Not found: order 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::NotFound("Order not found".to_string()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_is_rejection() {
        assert!(is_rejection(&ApiError::Status {
            status: StatusCode::CONFLICT,
            detail: "Category has products".to_string(),
        }));
        assert!(!is_rejection(&ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            detail: String::new(),
        }));
        assert!(!is_rejection(&ApiError::Unauthorized("expired".to_string())));
    }

    #[test]
    fn test_rejected_token_sends_to_login() {
        let response = AppError::Api(ApiError::Unauthorized("expired".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some(SESSION_EXPIRED_PATH)
        );
    }
}
