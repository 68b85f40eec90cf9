//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use duka_api_client::{OrderQuery, ProductQuery};
use duka_core::OrderStatus;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::orders::OrderRow;
use crate::state::AppState;
use crate::views::PageContext;

/// Dashboard metrics.
#[derive(Debug, Clone, Default)]
pub struct DashboardMetrics {
    pub products: u64,
    pub categories: usize,
    pub orders: u64,
    pub pending_orders: u64,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub metrics: DashboardMetrics,
    pub orders: Vec<OrderRow>,
}

/// Dashboard page handler.
#[instrument(skip(state, ctx, admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<DashboardTemplate> {
    let api = state.api();
    let product_count = ProductQuery {
        limit: Some(1),
        ..ProductQuery::default()
    };
    let recent = OrderQuery::page(1, 5, None);
    let pending = OrderQuery::page(1, 1, Some(OrderStatus::Pending));

    let (products, categories, orders, pending) = tokio::try_join!(
        api.list_products(&product_count),
        api.list_categories(),
        api.all_orders(&admin.token, &recent),
        api.all_orders(&admin.token, &pending),
    )?;

    Ok(DashboardTemplate {
        ctx,
        metrics: DashboardMetrics {
            products: products.total,
            categories: categories.len(),
            orders: orders.total,
            pending_orders: pending.total,
        },
        orders: orders.items.iter().map(OrderRow::from).collect(),
    })
}
