//! M-Pesa payment for pay-now orders.
//!
//! `POST /payment` sends the STK push and opens a polling window in the
//! session. The payment page then polls `GET /payment/status`, and each poll
//! asks the API once for the order's transaction. The deadline is enforced
//! here rather than in the browser, so a reload cannot extend it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use duka_api_client::{PaymentOutcome, StkPushRequest};
use duka_core::MpesaPhone;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::session::{load_pending_payment, save_pending_payment};
use crate::models::{Flash, PendingPayment, push_flash, session_keys};
use crate::state::AppState;
use crate::views::{HxRequest, PageContext};

const CONFIRMATION_PATH: &str = "/order-confirmation";

#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    pub phone_number: String,
}

/// Poll fragment state.
#[derive(Clone)]
pub struct PaymentStatusView {
    pub order_id: i64,
    /// Still waiting; the fragment keeps polling.
    pub polling: bool,
    pub interval_secs: u64,
    /// Failure explanation once polling stopped.
    pub error: Option<String>,
}

/// Payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/show.html")]
pub struct PaymentTemplate {
    pub ctx: PageContext,
    pub order_id: i64,
    pub amount: String,
    pub phone_number: String,
    pub status: PaymentStatusView,
}

/// Poll fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/payment_status.html")]
pub struct PaymentStatusTemplate {
    pub status: PaymentStatusView,
}

fn interval_secs(state: &AppState) -> u64 {
    state.poller().interval().as_secs().max(1)
}

/// Display the M-Pesa form, or the polling status while a push is pending.
#[instrument(skip(state, ctx, session, _customer))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    session: Session,
    RequireAuth(_customer): RequireAuth,
) -> Result<Response> {
    let Some(pending) = load_pending_payment(&session).await? else {
        push_flash(&session, Flash::info("No order is awaiting payment.")).await;
        return Ok(Redirect::to("/orders").into_response());
    };

    let phone_number = pending
        .phone_hint
        .as_deref()
        .and_then(|p| MpesaPhone::parse(p).ok())
        .map(|p| p.local_display().replace(' ', ""))
        .unwrap_or_default();

    Ok(PaymentTemplate {
        ctx,
        order_id: pending.order_id.as_i64(),
        amount: pending.amount().display_exact(),
        phone_number,
        status: PaymentStatusView {
            order_id: pending.order_id.as_i64(),
            polling: pending.is_polling(),
            interval_secs: interval_secs(&state),
            error: None,
        },
    }
    .into_response())
}

/// Send the STK push for the pending order.
#[instrument(skip(state, session, customer, form))]
pub async fn initiate(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<PaymentForm>,
) -> Result<Response> {
    let Some(mut pending) = load_pending_payment(&session).await? else {
        push_flash(&session, Flash::info("No order is awaiting payment.")).await;
        return Ok(Redirect::to("/orders").into_response());
    };

    let phone = match MpesaPhone::parse(&form.phone_number) {
        Ok(phone) => phone,
        Err(e) => {
            push_flash(&session, Flash::error(e.to_string())).await;
            return Ok(Redirect::to("/payment").into_response());
        }
    };

    let request = StkPushRequest {
        order_id: pending.order_id,
        phone_number: phone.as_str().to_string(),
        amount: pending.amount().whole_shillings(),
    };

    match state.api().initiate_stk_push(&customer.token, &request).await {
        Ok(response) => {
            tracing::info!(
                order_id = %pending.order_id,
                checkout_request_id = response.checkout_request_id().unwrap_or_default(),
                "STK push sent"
            );
            pending.phone_hint = Some(phone.as_str().to_string());
            pending.start_polling(Utc::now(), state.poller().timeout());
            save_pending_payment(&session, &pending).await?;
            let message = response
                .customer_message()
                .unwrap_or("Check your phone and enter your M-Pesa PIN to complete the payment.");
            push_flash(&session, Flash::info(message)).await;
        }
        Err(e) if e.is_auth_error() => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, order_id = %pending.order_id, "STK push failed");
            push_flash(&session, Flash::error(e.user_message())).await;
        }
    }

    Ok(Redirect::to("/payment").into_response())
}

/// One poll of the payment status.
#[instrument(skip(state, session, customer, hx))]
pub async fn status(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    hx: HxRequest,
) -> Result<Response> {
    let Some(mut pending) = load_pending_payment(&session).await? else {
        return Ok(redirect(&hx, CONFIRMATION_PATH));
    };

    let mut view = PaymentStatusView {
        order_id: pending.order_id.as_i64(),
        polling: false,
        interval_secs: interval_secs(&state),
        error: None,
    };
    if !pending.is_polling() {
        return Ok(PaymentStatusTemplate { status: view }.into_response());
    }

    let mut outcome = state
        .poller()
        .check_once(&customer.token, pending.order_id)
        .await;
    if outcome == PaymentOutcome::Pending && pending.is_past_deadline(Utc::now()) {
        tracing::warn!(order_id = %pending.order_id, "Payment confirmation timed out");
        outcome = PaymentOutcome::TimedOut;
    }

    match outcome {
        PaymentOutcome::Paid { receipt, .. } => {
            let marked = state
                .poller()
                .mark_processing(&customer.token, pending.order_id)
                .await;
            tracing::info!(order_id = %pending.order_id, marked_processing = marked, "Payment confirmed");
            let summary = pending.summary.with_receipt(receipt);
            session.insert(session_keys::CONFIRMATION, &summary).await?;
            session
                .remove::<PendingPayment>(session_keys::PENDING_PAYMENT)
                .await?;
            push_flash(&session, Flash::success("Payment received. Thank you!")).await;
            Ok(redirect(&hx, CONFIRMATION_PATH))
        }
        PaymentOutcome::Pending => {
            view.polling = true;
            Ok(PaymentStatusTemplate { status: view }.into_response())
        }
        failed => {
            pending.stop_polling();
            save_pending_payment(&session, &pending).await?;
            view.error = failed.failure_message().map(str::to_string);
            Ok(PaymentStatusTemplate { status: view }.into_response())
        }
    }
}

/// HTMX follows `HX-Redirect`; a plain request gets a 303.
fn redirect(hx: &HxRequest, to: &'static str) -> Response {
    if hx.0 {
        (AppendHeaders([("HX-Redirect", to)]), "").into_response()
    } else {
        Redirect::to(to).into_response()
    }
}
