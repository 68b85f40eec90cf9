//! Wishlist (API favorites).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use duka_core::ProductId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{HxRequest, PageContext, ProductCard};

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/index.html")]
pub struct WishlistTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCard>,
}

/// Heart button fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorite_button.html")]
pub struct FavoriteButtonTemplate {
    pub product_id: i64,
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub product_id: i64,
    /// Where plain form posts go back to.
    pub redirect_to: Option<String>,
}

/// Display the customer's favorites.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<WishlistTemplate> {
    let favorites = state.api().list_favorites(&customer.token).await?;
    let ids: Vec<ProductId> = favorites.iter().map(|f| f.product_id).collect();
    let products = if ids.is_empty() {
        Vec::new()
    } else {
        state.api().products_by_ids(&ids).await?
    };

    Ok(WishlistTemplate {
        ctx,
        products: products.iter().map(ProductCard::from).collect(),
    })
}

/// Add or remove a favorite.
#[instrument(skip(state, session, customer, hx))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    hx: HxRequest,
    Form(form): Form<ToggleForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let favorites = state.api().list_favorites(&customer.token).await?;

    let is_favorite = match favorites.iter().find(|f| f.product_id == product_id) {
        Some(existing) => {
            state.api().remove_favorite(&customer.token, existing.id).await?;
            false
        }
        None => {
            state.api().add_favorite(&customer.token, product_id).await?;
            true
        }
    };

    if hx.0 {
        return Ok(FavoriteButtonTemplate {
            product_id: form.product_id,
            is_favorite,
        }
        .into_response());
    }

    let message = if is_favorite {
        "Added to your wishlist"
    } else {
        "Removed from your wishlist"
    };
    push_flash(&session, Flash::success(message)).await;

    let target = super::auth::safe_next(form.redirect_to.as_deref())
        .unwrap_or_else(|| "/wishlist".to_string());
    Ok(Redirect::to(&target).into_response())
}
