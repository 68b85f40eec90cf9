//! Newsletter sign-up from the footer.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::ApiError;
use duka_core::Email;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::HxRequest;

#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
    /// Where plain form posts go back to.
    pub redirect_to: Option<String>,
}

/// Sign-up result fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/newsletter_result.html")]
pub struct NewsletterResultTemplate {
    pub flash: Flash,
}

/// Outcome of a sign-up, or the error to propagate.
async fn subscribe_email(state: &AppState, raw: &str) -> Result<Flash> {
    let Ok(email) = Email::parse(raw) else {
        return Ok(Flash::error("Please enter a valid email address."));
    };
    match state.api().subscribe_newsletter(email.as_str()).await {
        Ok(_) => {
            tracing::info!("Newsletter subscription");
            Ok(Flash::success("Thanks for subscribing! Watch your inbox for offers."))
        }
        Err(e @ ApiError::RateLimited(_)) => Ok(Flash::error(e.user_message())),
        Err(e) if matches!(&e, ApiError::Status { status, .. } if status.is_client_error()) => {
            Ok(Flash::info(e.user_message()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Subscribe to the newsletter.
#[instrument(skip(state, session, hx, form))]
pub async fn subscribe(
    State(state): State<AppState>,
    session: Session,
    hx: HxRequest,
    Form(form): Form<SubscribeForm>,
) -> Result<Response> {
    let flash = subscribe_email(&state, &form.email).await?;
    if hx.0 {
        return Ok(NewsletterResultTemplate { flash }.into_response());
    }
    push_flash(&session, flash).await;
    let target = super::auth::safe_next(form.redirect_to.as_deref()).unwrap_or_else(|| "/".to_string());
    Ok(Redirect::to(&target).into_response())
}
