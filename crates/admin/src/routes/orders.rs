//! Order route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{Order, OrderQuery, OrderWithUser};
use duka_core::{OrderId, OrderStatus};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, is_rejection};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{HxRequest, PageContext, Pagination, non_empty, query_string};

const PAGE_SIZE: u32 = 20;
const DATE_FORMAT: &str = "%d %b %Y %H:%M";

/// Query parameters for the orders list.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

/// Order row for tables.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_id: i64,
    pub customer: String,
    pub email: String,
    pub date: String,
    pub total: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
}

impl From<&OrderWithUser> for OrderRow {
    fn from(order: &OrderWithUser) -> Self {
        Self {
            order_id: order.order_id.as_i64(),
            customer: order
                .address
                .as_ref()
                .map_or_else(|| order.user.username.clone(), |a| a.full_name()),
            email: order.user.email.clone(),
            date: order.datetime.format(DATE_FORMAT).to_string(),
            total: order.total.display(),
            status_label: order.status.label(),
            badge_class: order.status.badge_class(),
        }
    }
}

/// Status filter tab.
#[derive(Debug, Clone)]
pub struct StatusFilter {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn status_filters(selected: Option<OrderStatus>) -> Vec<StatusFilter> {
    std::iter::once(StatusFilter {
        value: "",
        label: "All",
        selected: selected.is_none(),
    })
    .chain(OrderStatus::ALL.iter().map(|&status| StatusFilter {
        value: status.as_str(),
        label: status.label(),
        selected: selected == Some(status),
    }))
    .collect()
}

/// Orders list template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderRow>,
    pub statuses: Vec<StatusFilter>,
    pub search: String,
    pub pagination: Pagination,
}

/// Orders list page handler.
#[instrument(skip(state, ctx, admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersIndexTemplate> {
    // Unknown status values fall back to all orders
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok());
    let search = non_empty(query.search.as_deref());
    let page = query.page.unwrap_or(1).max(1);

    let mut order_query = OrderQuery::page(page, PAGE_SIZE, status);
    order_query.search.clone_from(&search);
    let result = state.api().all_orders(&admin.token, &order_query).await?;

    let pagination = Pagination::new(&result, |page| {
        format!(
            "/orders{}",
            query_string(&[
                ("status", status.map(|s| s.as_str().to_string())),
                ("search", search.clone()),
                ("page", Some(page.to_string())),
            ])
        )
    });

    Ok(OrdersIndexTemplate {
        ctx,
        orders: result.items.iter().map(OrderRow::from).collect(),
        statuses: status_filters(status),
        search: search.unwrap_or_default(),
        pagination,
    })
}

/// Line item on the order page.
#[derive(Debug, Clone)]
pub struct LineView {
    pub product_id: Option<i64>,
    pub name: String,
    pub quantity: u32,
    pub total: String,
}

/// Delivery block on the order page.
#[derive(Debug, Clone)]
pub struct ShippingView {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub additional_info: String,
    pub city: String,
    pub region: String,
}

/// Order detail view.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub order_id: i64,
    pub user_id: i64,
    pub date: String,
    pub completed_at: Option<String>,
    pub item_count: u32,
    pub subtotal: String,
    pub delivery_fee: String,
    pub total: String,
    pub lines: Vec<LineView>,
    pub shipping: Option<ShippingView>,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.as_i64(),
            user_id: order.user_id.as_i64(),
            date: order.datetime.format(DATE_FORMAT).to_string(),
            completed_at: order
                .completed_at
                .map(|at| at.format(DATE_FORMAT).to_string()),
            item_count: order.item_count(),
            subtotal: order.subtotal().display(),
            delivery_fee: order.delivery_fee.display(),
            total: order.total.display(),
            lines: order
                .order_details
                .iter()
                .map(|detail| LineView {
                    product_id: detail.product_id.map(|id| id.as_i64()),
                    name: detail.product_name().to_string(),
                    quantity: detail.quantity,
                    total: detail.total_price.display(),
                })
                .collect(),
            shipping: order.address.as_ref().map(|a| ShippingView {
                name: a.full_name(),
                phone_number: a.phone_number.clone(),
                address: a.address.clone(),
                additional_info: a.additional_info.clone().unwrap_or_default(),
                city: a.city.clone(),
                region: a.region.clone(),
            }),
        }
    }
}

/// Status option in the change-status select.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Current status badge and the picker to change it.
#[derive(Debug, Clone)]
pub struct StatusPanel {
    pub order_id: i64,
    pub label: &'static str,
    pub badge_class: &'static str,
    pub options: Vec<StatusOption>,
}

impl StatusPanel {
    fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id: order_id.as_i64(),
            label: status.label(),
            badge_class: status.badge_class(),
            options: OrderStatus::ALL
                .iter()
                .map(|&s| StatusOption {
                    value: s.as_str(),
                    label: s.label(),
                    selected: s == status,
                })
                .collect(),
        }
    }
}

/// Status panel fragment (HTMX), swapped in place after a change.
#[derive(Template, WebTemplate)]
#[template(path = "partials/order_status.html")]
pub struct OrderStatusTemplate {
    pub status: StatusPanel,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: OrderDetailView,
    pub status: StatusPanel,
}

/// Order detail page handler.
#[instrument(skip(state, ctx, admin))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<OrderShowTemplate> {
    let order_id = OrderId::new(id);
    let order = state.api().get_order(&admin.token, order_id).await?;

    Ok(OrderShowTemplate {
        ctx,
        order: OrderDetailView::from(&order),
        status: StatusPanel::new(order_id, order.status),
    })
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Change an order's status.
///
/// HTMX requests get the refreshed badge; plain form posts redirect back to
/// the order with a flash.
#[instrument(skip(state, session, admin, form), fields(status = %form.status))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    HxRequest(is_htmx): HxRequest,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    let status: OrderStatus = form.status.parse().map_err(AppError::BadRequest)?;

    match state
        .api()
        .update_order_status(&admin.token, order_id, status)
        .await
    {
        Ok(()) => {
            tracing::info!(order_id = id, status = %status, "Order status changed");
            if is_htmx {
                let panel = StatusPanel::new(order_id, status);
                return Ok(OrderStatusTemplate { status: panel }.into_response());
            }
            push_flash(
                &session,
                Flash::success(format!("Order #{id} is now {}", status.label())),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            if is_htmx {
                return Err(AppError::BadRequest(e.user_message()));
            }
            push_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to(&format!("/orders/{id}")).into_response())
}
