//! Customer order history.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{Order, OrderQuery};
use duka_core::{OrderId, OrderStatus};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{PageContext, Pagination, query_string};

/// Orders per page.
const PAGE_SIZE: u32 = 10;

/// Longest cancellation reason accepted.
const MAX_REASON_LENGTH: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CancelForm {
    pub reason: String,
}

/// Status filter tab.
#[derive(Clone)]
pub struct StatusTab {
    pub label: String,
    pub url: String,
    pub selected: bool,
}

/// Order row in the overview.
#[derive(Clone)]
pub struct OrderRow {
    pub order_id: i64,
    pub date: String,
    pub item_count: u32,
    pub total: String,
    pub status_label: String,
    pub badge_class: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.as_i64(),
            date: order.datetime.format("%b %-d, %Y").to_string(),
            item_count: order.item_count(),
            total: order.total.display(),
            status_label: order.status.label().to_string(),
            badge_class: order.status.badge_class().to_string(),
        }
    }
}

/// Order line on the detail page.
#[derive(Clone)]
pub struct OrderLineView {
    pub product_id: Option<i64>,
    pub name: String,
    pub quantity: u32,
    pub total: String,
}

/// Orders overview template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub tabs: Vec<StatusTab>,
    pub orders: Vec<OrderRow>,
    pub pagination: Pagination,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: OrderRow,
    pub lines: Vec<OrderLineView>,
    pub subtotal: String,
    pub delivery_fee: String,
    pub ship_to: Option<String>,
    pub completed_at: Option<String>,
    pub can_cancel: bool,
}

fn status_tabs(selected: Option<OrderStatus>) -> Vec<StatusTab> {
    std::iter::once(StatusTab {
        label: "All".to_string(),
        url: "/orders".to_string(),
        selected: selected.is_none(),
    })
    .chain(OrderStatus::ALL.iter().map(|status| StatusTab {
        label: status.label().to_string(),
        url: format!("/orders?status={status}"),
        selected: selected == Some(*status),
    }))
    .collect()
}

/// Display the customer's orders.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersTemplate> {
    let status = query.status.as_deref().and_then(|s| s.parse::<OrderStatus>().ok());
    let page = query.page.unwrap_or(1).max(1);

    let orders = state
        .api()
        .my_orders(&customer.token, &OrderQuery::page(page, PAGE_SIZE, status))
        .await?;

    let pagination = Pagination::new(&orders, |p| {
        format!(
            "/orders{}",
            query_string(&[
                ("status", status.map(|s| s.to_string())),
                ("page", Some(p.to_string())),
            ])
        )
    });

    Ok(OrdersTemplate {
        ctx,
        tabs: status_tabs(status),
        orders: orders.items.iter().map(OrderRow::from).collect(),
        pagination,
    })
}

/// Fetch an order, hiding other customers' orders behind a 404.
async fn load_order(state: &AppState, customer: &crate::models::CurrentCustomer, id: i64) -> Result<Order> {
    let order = state.api().get_order(&customer.token, OrderId::new(id)).await?;
    if order.user_id != customer.user_id {
        return Err(AppError::NotFound(format!("order {id}")));
    }
    Ok(order)
}

/// Display one order.
#[instrument(skip(state, ctx, customer))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
) -> Result<OrderShowTemplate> {
    let order = load_order(&state, &customer, id).await?;

    Ok(OrderShowTemplate {
        ctx,
        lines: order
            .order_details
            .iter()
            .map(|line| OrderLineView {
                product_id: line.product_id.map(|p| p.as_i64()),
                name: line.product_name().to_string(),
                quantity: line.quantity,
                total: line.total_price.display(),
            })
            .collect(),
        subtotal: order.subtotal().display(),
        delivery_fee: order.delivery_fee.display(),
        ship_to: order
            .address
            .as_ref()
            .map(|a| format!("{}, {}", a.full_name(), a.to_delivery_address().one_line())),
        completed_at: order
            .completed_at
            .map(|at| at.format("%b %-d, %Y").to_string()),
        can_cancel: order.status.is_cancellable(),
        order: OrderRow::from(&order),
    })
}

/// Ask staff to cancel an order.
#[instrument(skip(state, session, customer, form))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
    Form(form): Form<CancelForm>,
) -> Result<Response> {
    let back = format!("/orders/{id}");
    let reason = form.reason.trim();
    if reason.is_empty() {
        push_flash(&session, Flash::error("Please tell us why you want to cancel.")).await;
        return Ok(Redirect::to(&back).into_response());
    }
    if reason.chars().count() > MAX_REASON_LENGTH {
        push_flash(
            &session,
            Flash::error(format!("Please keep the reason under {MAX_REASON_LENGTH} characters.")),
        )
        .await;
        return Ok(Redirect::to(&back).into_response());
    }

    let order = load_order(&state, &customer, id).await?;
    if !order.status.is_cancellable() {
        push_flash(
            &session,
            Flash::error(format!("{} orders can no longer be cancelled.", order.status.label())),
        )
        .await;
        return Ok(Redirect::to(&back).into_response());
    }

    let response = state
        .api()
        .request_cancellation(&customer.token, order.order_id, reason)
        .await?;
    tracing::info!(order_id = id, "Cancellation requested");

    let message = if response.message.is_empty() {
        "Your cancellation request has been sent. We will get back to you shortly.".to_string()
    } else {
        response.message
    };
    push_flash(&session, Flash::success(message)).await;
    Ok(Redirect::to(&back).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tabs_mark_selection() {
        let tabs = status_tabs(Some(OrderStatus::Delivered));
        assert_eq!(tabs.len(), 5);
        assert!(!tabs[0].selected);
        let delivered = tabs.iter().find(|t| t.selected).map(|t| t.url.as_str());
        assert_eq!(delivered, Some("/orders?status=delivered"));

        assert!(status_tabs(None)[0].selected);
    }
}
