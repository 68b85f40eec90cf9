//! Staff login.
//!
//! Staff sign in with their commerce API account; only the `admin` and
//! `SUPERADMIN` roles get a session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::ApiError;
use duka_core::Email;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAdminAuth, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::state::AppState;
use crate::views::PageContext;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub expired: Option<String>,
    pub logged_out: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub notice: Option<String>,
}

fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "invalid_email" => "Please enter a valid email address.",
        "forbidden" => "This account does not have staff access.",
        "session" => "Could not start a session. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

fn login_error(code: &str) -> Response {
    Redirect::to(&format!("/auth/login?error={code}")).into_response()
}

/// Display the login page, or go to the dashboard when already signed in.
#[instrument(skip(ctx, session, current))]
pub async fn login_page(
    mut ctx: PageContext,
    session: Session,
    OptionalAdminAuth(current): OptionalAdminAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if current.is_some() && query.expired.is_none() {
        return Ok(Redirect::to("/").into_response());
    }

    let mut error = query.error.as_deref().map(|c| error_message(c).to_string());
    if query.expired.is_some() {
        clear_current_admin(&session).await?;
        clear_sentry_user();
        ctx.admin_user = None;
        error = Some("Your session has expired. Please log in again.".to_string());
    }

    Ok(LoginTemplate {
        ctx,
        error,
        notice: query
            .logged_out
            .is_some()
            .then(|| "You have been logged out.".to_string()),
    }
    .into_response())
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(login_error("invalid_email"));
    };

    let password = SecretString::from(form.password);
    let login = match state.api().login(email.as_str(), &password).await {
        Ok(login) => login,
        Err(ApiError::Unauthorized(_) | ApiError::NotFound(_)) => {
            return Ok(login_error("credentials"));
        }
        Err(ApiError::Status { status, .. }) if status.is_client_error() => {
            return Ok(login_error("credentials"));
        }
        Err(e) => return Err(e.into()),
    };

    if !login.user_role.is_admin() {
        tracing::warn!(role = %login.user_role, "Non-staff account tried to log in");
        return Ok(login_error("forbidden"));
    }

    let profile = state.api().me(&login.access_token).await?;
    let admin = CurrentAdmin {
        user_id: profile.id,
        username: profile.username,
        email: profile.email,
        role: profile.role,
        token: login.access_token,
    };

    if let Err(e) = set_current_admin(&session, &admin).await {
        tracing::error!(error = %e, "Failed to store admin in session");
        return Ok(login_error("session"));
    }
    set_sentry_user(&admin.user_id, &admin.email);
    tracing::info!(user_id = %admin.user_id, role = %admin.role, "Admin logged in");

    Ok(Redirect::to("/").into_response())
}

/// Logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login?logged_out=1").into_response())
}
