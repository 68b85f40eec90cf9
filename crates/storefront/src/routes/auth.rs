//! Authentication route handlers.
//!
//! Login exchanges email and password for an API bearer token, then loads
//! the customer's profile so the session knows who they are. Failures come
//! back to the form as short error codes in the query string.
//!
//! New accounts must follow the emailed verification link before they can
//! log in; following it logs them straight in. Forgotten passwords are reset
//! through a second emailed link.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{AccessToken, ApiError};
use duka_core::Email;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_customer, set_current_customer};
use crate::models::{CurrentCustomer, Flash, PendingVerification, push_flash, session_keys};
use crate::state::AppState;
use crate::views::{PageContext, query_string};

/// Shortest password accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Forgotten password form data.
#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// New password form data.
#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Query of the emailed links.
#[derive(Debug, Default, Deserialize)]
pub struct LinkQuery {
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    /// Set when the API rejected the stored token.
    pub expired: Option<String>,
    /// Page to return to after login.
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
}

/// Page shown after registering.
#[derive(Template, WebTemplate)]
#[template(path = "auth/check_email.html")]
pub struct CheckEmailTemplate {
    pub ctx: PageContext,
    pub email: String,
}

/// Forgotten password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub ctx: PageContext,
    pub error: Option<String>,
}

/// New password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub ctx: PageContext,
    pub token: String,
    pub error: Option<String>,
}

/// Only same-site paths are followed after login.
///
/// Browsers treat `\` like `/` and drop tabs and newlines, so `/\host` and
/// `/\t/host` are off-site too.
pub(crate) fn safe_next(next: Option<&str>) -> Option<String> {
    next.map(str::trim)
        .filter(|n| {
            n.starts_with('/')
                && !n.starts_with("//")
                && !n.starts_with("/auth/")
                && !n.chars().any(|c| c == '\\' || c.is_control())
        })
        .filter(|n| {
            url::Url::parse("http://duka.invalid")
                .and_then(|base| base.join(n))
                .is_ok_and(|joined| joined.host_str() == Some("duka.invalid"))
        })
        .map(str::to_string)
}

/// Turn an error code from the query string into a message.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "invalid_email" => "Please enter a valid email address.",
        "session" => "We could not sign you in. Please try again.",
        "username_required" => "Please choose a username.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "email_taken" => "An account with that email or username already exists.",
        "rate_limited" => "Too many attempts. Please wait a moment and try again.",
        "unverified" => "Please verify your email address before logging in. Check your inbox for a verification link.",
        "verification" => "That verification link is invalid or has expired.",
        "fields_required" => "Please fill in all fields.",
        "reset_token" => "That reset link is invalid or has expired. Please request a new one.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "registered" => Some("Account created. Please log in."),
        "logged_out" => Some("You have been logged out."),
        "reset_sent" => Some("If the email exists, a reset link has been sent."),
        "password_reset" => Some("Your password has been reset. Please log in."),
        _ => None,
    }
}

/// Wrong credentials rather than an outage.
fn is_rejection(error: &ApiError) -> bool {
    match error {
        ApiError::Unauthorized(_) | ApiError::NotFound(_) => true,
        ApiError::Status { status, .. } => status.is_client_error(),
        _ => false,
    }
}

/// The API refuses logins until the email link is followed.
fn is_unverified(error: &ApiError) -> bool {
    matches!(error, ApiError::Unauthorized(detail) if detail.to_lowercase().contains("verify your email"))
}

fn login_redirect(error: &str, next: Option<String>) -> Response {
    let query = query_string(&[("error", Some(error.to_string())), ("next", next)]);
    Redirect::to(&format!("/auth/login{query}")).into_response()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// `?expired=1` means the API stopped accepting the stored token, so the
/// stale customer is dropped before the form is shown.
#[instrument(skip(ctx, session))]
pub async fn login_page(
    mut ctx: PageContext,
    session: Session,
    Query(query): Query<AuthQuery>,
) -> Result<LoginTemplate> {
    let mut error = query.error.as_deref().map(|c| error_message(c).to_string());
    if query.expired.is_some() {
        clear_current_customer(&session).await?;
        clear_sentry_user();
        ctx.username = None;
        error = Some("Your session has expired. Please log in again.".to_string());
    }

    Ok(LoginTemplate {
        ctx,
        error,
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(str::to_string),
        next: safe_next(query.next.as_deref()).unwrap_or_default(),
    })
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref());
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(login_redirect("invalid_email", next));
    };

    let password = SecretString::from(form.password);
    let login = match state.api().login(email.as_str(), &password).await {
        Ok(login) => login,
        Err(ApiError::RateLimited(_)) => return Ok(login_redirect("rate_limited", next)),
        Err(e) if is_unverified(&e) => {
            tracing::info!("Login before email verification");
            return Ok(login_redirect("unverified", next));
        }
        Err(e) if is_rejection(&e) => {
            tracing::info!(error = %e, "Login rejected");
            return Ok(login_redirect("credentials", next));
        }
        Err(e) => return Err(e.into()),
    };

    let Some(customer) = start_session(&state, &session, login.access_token).await? else {
        return Ok(login_redirect("session", next));
    };
    tracing::info!(user_id = %customer.user_id, "Customer logged in");

    push_flash(&session, Flash::success(format!("Welcome back, {}!", customer.username))).await;
    Ok(Redirect::to(next.as_deref().unwrap_or("/")).into_response())
}

/// Load the profile behind a fresh token and remember the customer.
///
/// `None` when the session store refused the write.
async fn start_session(
    state: &AppState,
    session: &Session,
    token: AccessToken,
) -> Result<Option<CurrentCustomer>> {
    let profile = state.api().me(&token).await?;
    let customer = CurrentCustomer {
        user_id: profile.id,
        username: profile.username,
        email: profile.email,
        role: profile.role,
        token,
    };

    if let Err(e) = set_current_customer(session, &customer).await {
        tracing::error!(error = %e, "Failed to store customer in session");
        return Ok(None);
    }
    set_sentry_user(&customer.user_id, &customer.username);
    Ok(Some(customer))
}

/// Log out, keeping the cart.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_customer(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login?success=logged_out").into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: PageContext, Query(query): Query<AuthQuery>) -> RegisterTemplate {
    RegisterTemplate {
        ctx,
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
    }
}

/// Check the registration form, returning an error code.
fn validate_registration(form: &RegisterForm) -> std::result::Result<Email, &'static str> {
    if form.username.trim().is_empty() {
        return Err("username_required");
    }
    let email = Email::parse(&form.email).map_err(|_| "invalid_email")?;
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("password_too_short");
    }
    if form.password != form.password_confirm {
        return Err("password_mismatch");
    }
    Ok(email)
}

/// Handle registration form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let email = match validate_registration(&form) {
        Ok(email) => email,
        Err(code) => return Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response()),
    };

    let password = SecretString::from(form.password);
    match state
        .api()
        .register_customer(form.username.trim(), email.as_str(), &password)
        .await
    {
        Ok(registered) => {
            tracing::info!(user_id = ?registered.user_id, "Customer registered");
            let Some(user_id) = registered.user_id else {
                return Ok(Redirect::to("/auth/login?success=registered").into_response());
            };
            let pending = PendingVerification {
                user_id,
                email: email.as_str().to_string(),
            };
            session
                .insert(session_keys::PENDING_VERIFICATION, &pending)
                .await?;
            Ok(Redirect::to("/auth/check-email").into_response())
        }
        Err(ApiError::Status { status, detail }) if status.is_client_error() => {
            tracing::info!(%status, detail = %detail, "Registration rejected");
            let lowered = detail.to_lowercase();
            let code = if lowered.contains("already") || lowered.contains("exist") {
                "email_taken"
            } else {
                "failed"
            };
            Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Email Verification Routes
// =============================================================================

/// Tell a new customer to open the emailed link.
pub async fn check_email(ctx: PageContext, session: Session) -> Result<Response> {
    let Some(pending) = session
        .get::<PendingVerification>(session_keys::PENDING_VERIFICATION)
        .await?
    else {
        return Ok(Redirect::to("/auth/login").into_response());
    };
    Ok(CheckEmailTemplate {
        ctx,
        email: pending.email,
    }
    .into_response())
}

/// Send the verification email again.
#[instrument(skip(state, session))]
pub async fn resend_verification(State(state): State<AppState>, session: Session) -> Result<Response> {
    let Some(pending) = session
        .get::<PendingVerification>(session_keys::PENDING_VERIFICATION)
        .await?
    else {
        return Ok(Redirect::to("/auth/login").into_response());
    };

    match state.api().resend_verification(pending.user_id).await {
        Ok(_) => {
            push_flash(&session, Flash::success("Verification email sent. Please check your inbox.")).await;
            Ok(Redirect::to("/auth/check-email").into_response())
        }
        Err(e) if e.is_not_found() => {
            session
                .remove::<PendingVerification>(session_keys::PENDING_VERIFICATION)
                .await?;
            push_flash(&session, Flash::info("Your email is already verified. Please log in.")).await;
            Ok(Redirect::to("/auth/login").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Follow the emailed verification link, logging the customer in.
#[instrument(skip(state, session, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LinkQuery>,
) -> Result<Response> {
    let Some(token) = query.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(login_redirect("verification", None));
    };

    let verified = match state.api().verify_email(token).await {
        Ok(verified) => verified,
        Err(e) if is_rejection(&e) => {
            tracing::info!(error = %e, "Verification link rejected");
            return Ok(login_redirect("verification", None));
        }
        Err(e) => return Err(e.into()),
    };

    session
        .remove::<PendingVerification>(session_keys::PENDING_VERIFICATION)
        .await?;
    let Some(customer) = start_session(&state, &session, verified.access_token).await? else {
        return Ok(login_redirect("session", None));
    };
    tracing::info!(user_id = %customer.user_id, "Customer verified their email");

    push_flash(&session, Flash::success("Email verified successfully! Welcome to Duka!")).await;
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Ask for the email to send a reset link to.
pub async fn forgot_password_page(ctx: PageContext, Query(query): Query<AuthQuery>) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate {
        ctx,
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
    }
}

/// Request a reset link. The answer does not reveal whether the account exists.
#[instrument(skip(state, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response> {
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(Redirect::to("/auth/forgot-password?error=invalid_email").into_response());
    };
    match state.api().request_password_reset(email.as_str()).await {
        Ok(_) => {}
        Err(ApiError::RateLimited(_)) => {
            return Ok(Redirect::to("/auth/forgot-password?error=rate_limited").into_response());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/auth/login?success=reset_sent").into_response())
}

/// Show the new password form for an emailed reset link.
pub async fn reset_password_page(ctx: PageContext, Query(query): Query<LinkQuery>) -> Response {
    let Some(token) = query.token.filter(|t| !t.trim().is_empty()) else {
        return Redirect::to("/auth/forgot-password").into_response();
    };
    ResetPasswordTemplate {
        ctx,
        token,
        error: query.error.as_deref().map(|c| error_message(c).to_string()),
    }
    .into_response()
}

/// Check the new password form, returning an error code.
fn validate_new_password(form: &ResetPasswordForm) -> std::result::Result<(), &'static str> {
    if form.password.is_empty() || form.password_confirm.is_empty() {
        return Err("fields_required");
    }
    if form.password != form.password_confirm {
        return Err("password_mismatch");
    }
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("password_too_short");
    }
    Ok(())
}

/// Set the new password.
#[instrument(skip(state, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    if form.token.trim().is_empty() {
        return Ok(Redirect::to("/auth/forgot-password").into_response());
    }
    if let Err(code) = validate_new_password(&form) {
        let query = query_string(&[
            ("token", Some(form.token.clone())),
            ("error", Some(code.to_string())),
        ]);
        return Ok(Redirect::to(&format!("/auth/reset-password{query}")).into_response());
    }

    let password = SecretString::from(form.password);
    match state.api().reset_password(form.token.trim(), &password).await {
        Ok(_) => {
            tracing::info!("Password reset");
            Ok(Redirect::to("/auth/login?success=password_reset").into_response())
        }
        Err(e) if is_rejection(&e) => {
            tracing::info!(error = %e, "Reset link rejected");
            Ok(Redirect::to("/auth/forgot-password?error=reset_token").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: "wanjiku".to_string(),
            email: "wanjiku@example.com".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("/checkout")), Some("/checkout".to_string()));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/auth/login")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_safe_next_rejects_backslash_and_control_tricks() {
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/\\/evil.example")), None);
        assert_eq!(safe_next(Some("/\t/evil.example")), None);
        assert_eq!(safe_next(Some("/\n/evil.example")), None);
        assert_eq!(safe_next(Some("/%2F%2Fevil.example")), Some("/%2F%2Fevil.example".to_string()));
        assert_eq!(
            safe_next(Some("/store?search=a%5Cb")),
            Some("/store?search=a%5Cb".to_string())
        );
    }

    #[test]
    fn test_validate_registration_codes() {
        assert!(validate_registration(&registration("longenough", "longenough")).is_ok());
        assert_eq!(
            validate_registration(&registration("short", "short")).unwrap_err(),
            "password_too_short"
        );
        assert_eq!(
            validate_registration(&registration("longenough", "different")).unwrap_err(),
            "password_mismatch"
        );
    }

    #[test]
    fn test_validate_new_password_codes() {
        let form = |password: &str, confirm: &str| ResetPasswordForm {
            token: "reset-2".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        };
        assert_eq!(validate_new_password(&form("", "")), Err("fields_required"));
        assert_eq!(validate_new_password(&form("longenough", "other")), Err("password_mismatch"));
        assert_eq!(validate_new_password(&form("short", "short")), Err("password_too_short"));
        assert_eq!(validate_new_password(&form("longenough", "longenough")), Ok(()));
    }

    #[test]
    fn test_unverified_login_is_told_apart() {
        let unverified = ApiError::Unauthorized(
            "Please verify your email address before logging in.".to_string(),
        );
        assert!(is_unverified(&unverified));
        assert!(!is_unverified(&ApiError::Unauthorized("Incorrect email or password".to_string())));
    }

    #[test]
    fn test_unknown_codes_get_generic_message() {
        assert_eq!(error_message("credentials"), "Invalid email or password.");
        assert_eq!(
            error_message("<script>"),
            "Something went wrong. Please try again."
        );
        assert_eq!(success_message("nope"), None);
    }
}
