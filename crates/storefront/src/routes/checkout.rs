//! Checkout: delivery and payment choices, order creation and confirmation.
//!
//! The checkout form re-renders its totals through `GET /checkout/summary`
//! whenever a choice changes, so the delivery fee is always the one the
//! order will be created with.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{Address, CreateOrderRequest, OrderLine};
use duka_core::cart::Cart;
use duka_core::checkout::{CheckoutError, CheckoutSelection, OrderSummary};
use duka_core::delivery::{DeliveryMethod, PaymentMethod};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::session::{load_cart, save_cart, save_pending_payment};
use crate::models::{Flash, PendingPayment, push_flash, session_keys};
use crate::routes::cart::CartView;
use crate::state::AppState;
use crate::views::{PageContext, query_string};

/// Raw checkout choices. Every field is optional so a half-filled form
/// still reaches the validation messages.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CheckoutForm {
    pub delivery_method: Option<String>,
    pub payment_method: Option<String>,
    pub address_id: Option<String>,
}

impl CheckoutForm {
    fn delivery_method(&self) -> Option<DeliveryMethod> {
        self.delivery_method.as_deref()?.parse().ok()
    }

    fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method.as_deref()?.parse().ok()
    }

    fn address_id(&self) -> Option<i64> {
        self.address_id.as_deref()?.trim().parse().ok()
    }

    /// Resolve the choices against the customer's address book.
    ///
    /// Without an explicit address the default one (or the first) is used.
    fn selection(&self, addresses: &[Address]) -> CheckoutSelection {
        let chosen = match self.address_id() {
            Some(id) => addresses.iter().find(|a| a.id.as_i64() == id),
            None => addresses
                .iter()
                .find(|a| a.is_default)
                .or_else(|| addresses.first()),
        };
        CheckoutSelection {
            delivery_method: self.delivery_method(),
            payment_method: self.payment_method(),
            address: chosen.map(Address::to_delivery_address),
        }
    }

    /// Query string that brings the customer back to the same choices.
    fn to_query(&self) -> String {
        query_string(&[
            ("delivery_method", self.delivery_method.clone()),
            ("payment_method", self.payment_method.clone()),
            ("address_id", self.address_id.clone()),
        ])
    }
}

/// A radio option.
#[derive(Clone)]
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub checked: bool,
}

/// An address option.
#[derive(Clone)]
pub struct AddressChoice {
    pub id: i64,
    pub name: String,
    pub line: String,
    pub phone: String,
    pub checked: bool,
}

/// Totals block.
#[derive(Clone)]
pub struct SummaryView {
    pub item_count: u32,
    pub subtotal: String,
    pub delivery_fee: String,
    pub total: String,
    pub delivery_label: String,
    pub payment_label: String,
}

impl SummaryView {
    fn new(cart: &Cart, selection: &CheckoutSelection) -> Self {
        let subtotal = cart.subtotal();
        let fee = selection.delivery_fee();
        Self {
            item_count: cart.total_quantity(),
            subtotal: subtotal.display(),
            delivery_fee: fee.display(),
            total: (subtotal + fee).display(),
            delivery_label: selection
                .delivery_method
                .map_or("Not selected", |m| m.label())
                .to_string(),
            payment_label: selection
                .payment_method
                .map_or("Not selected", |m| m.label())
                .to_string(),
        }
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub delivery_methods: Vec<ChoiceView>,
    pub payment_methods: Vec<ChoiceView>,
    pub addresses: Vec<AddressChoice>,
    pub summary: SummaryView,
}

/// Totals fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_summary.html")]
pub struct CheckoutSummaryTemplate {
    pub summary: SummaryView,
}

/// Confirmation display data.
#[derive(Clone)]
pub struct ConfirmationView {
    pub order_id: i64,
    pub order_date: String,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub subtotal: String,
    pub delivery_fee: String,
    pub total: String,
    pub delivery_method: String,
    pub payment_method: String,
    pub receipt: Option<String>,
}

impl From<&OrderSummary> for ConfirmationView {
    fn from(summary: &OrderSummary) -> Self {
        Self {
            order_id: summary.order_id.as_i64(),
            order_date: summary.order_date.clone(),
            name: summary.name.clone(),
            address: summary.address.clone(),
            phone_number: summary.phone_number.clone(),
            subtotal: summary.subtotal.display(),
            delivery_fee: summary.delivery_fee.display(),
            total: summary.total.display(),
            delivery_method: summary
                .delivery_method
                .map_or("", |m| m.label())
                .to_string(),
            payment_method: summary
                .payment_method
                .map_or("", |m| m.label())
                .to_string(),
            receipt: summary.receipt.clone(),
        }
    }
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub ctx: PageContext,
    pub order: ConfirmationView,
}

fn delivery_choices(selected: Option<DeliveryMethod>) -> Vec<ChoiceView> {
    [DeliveryMethod::Pickup, DeliveryMethod::Delivery]
        .into_iter()
        .map(|method| ChoiceView {
            value: method.as_str().to_string(),
            label: method.label().to_string(),
            checked: selected == Some(method),
        })
        .collect()
}

fn payment_choices(selected: Option<PaymentMethod>) -> Vec<ChoiceView> {
    [PaymentMethod::PayNow, PaymentMethod::PayLater]
        .into_iter()
        .map(|method| ChoiceView {
            value: method.as_str().to_string(),
            label: method.label().to_string(),
            checked: selected == Some(method),
        })
        .collect()
}

/// Display the checkout page.
#[instrument(skip(state, ctx, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Query(form): Query<CheckoutForm>,
) -> Result<Response> {
    let cart = load_cart(&session).await?;
    if cart.is_empty() {
        push_flash(&session, Flash::info(CheckoutError::EmptyCart.to_string())).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let addresses = state.api().list_addresses(&customer.token).await?;
    let selection = form.selection(&addresses);
    let selected_address = selection.address.as_ref().map(|a| a.id);

    Ok(CheckoutTemplate {
        ctx,
        cart: CartView::from(&cart),
        delivery_methods: delivery_choices(selection.delivery_method),
        payment_methods: payment_choices(selection.payment_method),
        addresses: addresses
            .iter()
            .map(|a| AddressChoice {
                id: a.id.as_i64(),
                name: a.full_name(),
                line: a.to_delivery_address().one_line(),
                phone: a.phone_number.clone(),
                checked: selected_address == Some(a.id),
            })
            .collect(),
        summary: SummaryView::new(&cart, &selection),
    }
    .into_response())
}

/// Totals for the current choices (HTMX).
#[instrument(skip(state, session, customer))]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Query(form): Query<CheckoutForm>,
) -> Result<CheckoutSummaryTemplate> {
    let cart = load_cart(&session).await?;
    let addresses = state.api().list_addresses(&customer.token).await?;
    Ok(CheckoutSummaryTemplate {
        summary: SummaryView::new(&cart, &form.selection(&addresses)),
    })
}

/// Validate the choices and create the order.
///
/// Pay-now orders continue to the M-Pesa page; pay-later orders go straight
/// to the confirmation.
#[instrument(skip(state, session, customer))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await?;
    if cart.is_empty() {
        push_flash(&session, Flash::error(CheckoutError::EmptyCart.to_string())).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let addresses = state.api().list_addresses(&customer.token).await?;
    let selection = form.selection(&addresses);
    if let Err(e) = selection.validate() {
        push_flash(&session, Flash::error(e.to_string())).await;
        return Ok(Redirect::to(&format!("/checkout{}", form.to_query())).into_response());
    }

    let request = CreateOrderRequest {
        cart: cart
            .items()
            .iter()
            .map(|item| OrderLine {
                id: item.product_id,
                quantity: item.quantity,
            })
            .collect(),
        delivery_fee: selection.delivery_fee(),
        address_id: selection.order_address_id(),
    };

    let created = match state.api().create_order(&customer.token, &request).await {
        Ok(created) => created,
        Err(e) if e.is_auth_error() => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Order creation failed");
            push_flash(&session, Flash::error(e.user_message())).await;
            return Ok(Redirect::to(&format!("/checkout{}", form.to_query())).into_response());
        }
    };

    tracing::info!(order_id = %created.order_id, "Order created");
    crate::error::add_breadcrumb(
        "checkout",
        "Order created",
        &[("order_id", &created.order_id.to_string())],
    );

    let summary = OrderSummary::new(
        created.order_id,
        &selection,
        cart.subtotal(),
        chrono::Utc::now().date_naive(),
    );
    cart.clear();
    save_cart(&session, &cart).await?;

    if selection.payment_method == Some(PaymentMethod::PayNow) {
        let phone_hint = selection.address.as_ref().map(|a| a.phone_number.clone());
        save_pending_payment(&session, &PendingPayment::new(summary, phone_hint)).await?;
        return Ok(Redirect::to("/payment").into_response());
    }

    session.insert(session_keys::CONFIRMATION, &summary).await?;
    push_flash(&session, Flash::success("Order placed successfully!")).await;
    Ok(Redirect::to("/order-confirmation").into_response())
}

/// Display the last confirmed order.
#[instrument(skip(ctx, session))]
pub async fn confirmation(ctx: PageContext, session: Session) -> Result<Response> {
    let Some(summary) = session
        .get::<OrderSummary>(session_keys::CONFIRMATION)
        .await?
    else {
        return Ok(Redirect::to("/orders").into_response());
    };

    Ok(ConfirmationTemplate {
        ctx,
        order: ConfirmationView::from(&summary),
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use duka_core::AddressId;

    use super::*;

    fn address(id: i64, region: &str, is_default: bool) -> Address {
        Address {
            id: AddressId::new(id),
            first_name: "Wanjiku".to_string(),
            last_name: "Kamau".to_string(),
            phone_number: "0712345678".to_string(),
            address: "Moi Avenue 12".to_string(),
            additional_info: None,
            region: region.to_string(),
            city: "default".to_string(),
            is_default,
        }
    }

    #[test]
    fn test_selection_prefers_explicit_then_default_address() {
        let book = vec![address(1, "Coast", false), address(2, "Nairobi", true)];

        let form = CheckoutForm {
            delivery_method: Some("delivery".to_string()),
            payment_method: Some("pay-later".to_string()),
            address_id: None,
        };
        assert_eq!(form.selection(&book).address.unwrap().id, AddressId::new(2));

        let form = CheckoutForm {
            address_id: Some("1".to_string()),
            ..form
        };
        assert_eq!(form.selection(&book).address.unwrap().id, AddressId::new(1));
    }

    #[test]
    fn test_unparseable_choices_count_as_missing() {
        let form = CheckoutForm {
            delivery_method: Some(String::new()),
            payment_method: Some("bitcoin".to_string()),
            address_id: Some("abc".to_string()),
        };
        let selection = form.selection(&[]);
        assert_eq!(selection.delivery_method, None);
        assert_eq!(selection.payment_method, None);
        assert_eq!(
            selection.validate(),
            Err(CheckoutError::MissingDeliveryMethod)
        );
    }

    #[test]
    fn test_to_query_keeps_choices() {
        let form = CheckoutForm {
            delivery_method: Some("pickup".to_string()),
            payment_method: None,
            address_id: Some("3".to_string()),
        };
        assert_eq!(form.to_query(), "?delivery_method=pickup&address_id=3");
    }
}
