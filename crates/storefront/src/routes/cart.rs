//! Cart route handlers.
//!
//! The cart lives in the session. HTMX requests get fragments back; plain
//! form posts redirect to the cart page with a flash message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use duka_core::ProductId;
use duka_core::cart::{Cart, CartError, CartItem};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::models::session::{load_cart, save_cart};
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{HxRequest, PageContext};

/// Event HTMX listeners use to refresh the header badge.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i64,
    pub name: String,
    pub price: String,
    pub line_total: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub can_increase: bool,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.as_i64(),
            name: item.name.clone(),
            price: item.price.display(),
            line_total: item.line_total().display(),
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            can_increase: item.can_increase(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
    pub is_empty: bool,
    /// Stock warning from the last change.
    pub notice: Option<String>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            subtotal: cart.subtotal().display(),
            item_count: cart.total_quantity(),
            is_empty: cart.is_empty(),
            notice: None,
        }
    }
}

impl CartView {
    fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }
}

/// Form data naming a product.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub product_id: i64,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
    /// Out-of-band stock notice shown next to the add button.
    pub notice: Option<String>,
}

/// Display cart page.
#[instrument(skip(ctx, session))]
pub async fn show(ctx: PageContext, session: Session) -> Result<CartShowTemplate> {
    let cart = load_cart(&session).await?;
    Ok(CartShowTemplate {
        ctx,
        cart: CartView::from(&cart),
    })
}

/// Add one unit of a product (HTMX).
///
/// Stock and price come fresh from the API so the cart never holds more
/// than is on hand.
#[instrument(skip(state, session, hx))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    hx: HxRequest,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let product = state.api().get_product(ProductId::new(form.product_id)).await?;
    let mut cart = load_cart(&session).await?;

    let notice = match cart.add(product.to_cart_product()) {
        Ok(()) => {
            save_cart(&session, &cart).await?;
            crate::error::add_breadcrumb(
                "cart",
                "Added to cart",
                &[("product_id", &form.product_id.to_string())],
            );
            None
        }
        Err(e) => Some(e.to_string()),
    };

    if hx.0 {
        return Ok((
            AppendHeaders([CART_UPDATED]),
            CartCountTemplate {
                count: cart.total_quantity(),
                notice,
            },
        )
            .into_response());
    }

    let flash = notice.map_or_else(
        || Flash::success(format!("{} added to cart", product.name)),
        Flash::error,
    );
    push_flash(&session, flash).await;
    Ok(Redirect::to("/cart").into_response())
}

/// Add one more unit of a cart line (HTMX).
///
/// Stock is re-read from the API; the copy in the cart may be stale.
#[instrument(skip(state, session, hx))]
pub async fn increase(
    State(state): State<AppState>,
    session: Session,
    hx: HxRequest,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let product = state
        .api()
        .refresh_product(ProductId::new(form.product_id))
        .await?;
    update(&session, hx, |cart| cart.increase(product.to_cart_product())).await
}

/// Remove one unit; the line disappears at zero (HTMX).
#[instrument(skip(session, hx))]
pub async fn decrease(session: Session, hx: HxRequest, Form(form): Form<ProductForm>) -> Result<Response> {
    update(&session, hx, |cart| cart.decrease(ProductId::new(form.product_id))).await
}

/// Remove a cart line (HTMX).
#[instrument(skip(session, hx))]
pub async fn remove(session: Session, hx: HxRequest, Form(form): Form<ProductForm>) -> Result<Response> {
    update(&session, hx, |cart| {
        cart.remove(ProductId::new(form.product_id));
        Ok(())
    })
    .await
}

/// Empty the cart.
#[instrument(skip(session, hx))]
pub async fn clear(session: Session, hx: HxRequest) -> Result<Response> {
    update(&session, hx, |cart| {
        cart.clear();
        Ok(())
    })
    .await
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<CartCountTemplate> {
    let cart = load_cart(&session).await?;
    Ok(CartCountTemplate {
        count: cart.total_quantity(),
        notice: None,
    })
}

/// Apply a change, persist it and render the result.
async fn update(
    session: &Session,
    hx: HxRequest,
    change: impl FnOnce(&mut Cart) -> std::result::Result<(), CartError>,
) -> Result<Response> {
    let mut cart = load_cart(session).await?;
    let notice = match change(&mut cart) {
        Ok(()) => {
            save_cart(session, &cart).await?;
            None
        }
        Err(e) => Some(e.to_string()),
    };

    if hx.0 {
        return Ok((
            AppendHeaders([CART_UPDATED]),
            CartItemsTemplate {
                cart: CartView::from(&cart).with_notice(notice),
            },
        )
            .into_response());
    }

    if let Some(notice) = notice {
        push_flash(session, Flash::error(notice)).await;
    }
    Ok(Redirect::to("/cart").into_response())
}
