//! Product detail route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use duka_api_client::{Product, ProductQuery, Review};
use duka_core::ProductId;
use duka_core::review::Rating;
use duka_core::specification::{SpecDetail, format_detail, matching};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;
use crate::views::{PageContext, ProductCard, format_percent};

/// Products in the "more in this category" strip.
const RELATED_LIMIT: usize = 4;

/// Product detail display data.
#[derive(Clone)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub discount: Option<String>,
    pub stock_quantity: u32,
    pub in_stock: bool,
    pub is_new: bool,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory: Option<String>,
    pub images: Vec<String>,
    pub specs: Vec<SpecDetail>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            brand: product.brand.clone().filter(|b| !b.trim().is_empty()),
            description: product.description.clone().filter(|d| !d.trim().is_empty()),
            price: product.price.display(),
            original_price: product
                .has_markdown()
                .then(|| product.original_price.map(|p| p.display()))
                .flatten(),
            discount: (product.discount > rust_decimal::Decimal::ZERO)
                .then(|| format_percent(product.discount)),
            stock_quantity: product.stock_quantity,
            in_stock: product.in_stock(),
            is_new: product.is_new,
            category: product.category.as_ref().map(|c| c.name.clone()),
            category_id: product.category_id.map(|id| id.as_i64()),
            subcategory: product.subcategory.as_ref().map(|s| s.name.clone()),
            images: product.images.iter().map(|img| img.img_url.clone()).collect(),
            specs: format_detail(&product.product_specifications),
        }
    }
}

/// One review on the product page.
#[derive(Clone)]
pub struct ReviewView {
    pub author: String,
    pub stars: String,
    pub comment: Option<String>,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            author: review
                .username
                .clone()
                .unwrap_or_else(|| "Verified buyer".to_string()),
            stars: stars(review.rating),
            comment: review.comment.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

/// `★★★☆☆` for a 1-5 rating.
pub(crate) fn stars(rating: i32) -> String {
    Rating::new(rating.min(i32::from(Rating::MAX)))
        .map_or_else(|_| "☆".repeat(usize::from(Rating::MAX)), |r| r.display())
}

/// Query parameters for the product page.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPageQuery {
    /// Narrows the specifications table by name.
    #[serde(default)]
    pub spec: String,
}

/// Specification rows whose name contains `needle`; all rows when it is blank.
fn filtered_specs(product: &Product, needle: &str) -> Vec<SpecDetail> {
    if needle.trim().is_empty() {
        return format_detail(&product.product_specifications);
    }
    let found: Vec<_> = matching(&product.product_specifications, needle.trim())
        .into_iter()
        .cloned()
        .collect();
    format_detail(&found)
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductView,
    pub in_cart: u32,
    pub is_favorite: bool,
    pub rating: Option<String>,
    pub reviews: Vec<ReviewView>,
    pub related: Vec<ProductCard>,
    pub spec_filter: String,
}

/// Display a product.
#[instrument(skip(state, ctx, auth, session))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    OptionalAuth(auth): OptionalAuth,
    session: tower_sessions::Session,
    Path(id): Path<i64>,
    Query(query): Query<ProductPageQuery>,
) -> Result<ProductShowTemplate> {
    let product_id = ProductId::new(id);
    let product = state.api().get_product(product_id).await?;

    let is_favorite = auth.as_ref().is_some_and(|customer| {
        product
            .favorites
            .iter()
            .any(|favorite| favorite.user_id == customer.user_id)
    });

    let in_cart = crate::models::session::load_cart(&session)
        .await?
        .quantity_of(product_id);

    let related = match product.category_id {
        Some(category_id) => {
            let query = ProductQuery {
                category_id: Some(category_id),
                limit: Some(u32::try_from(RELATED_LIMIT + 1).unwrap_or(u32::MAX)),
                ..ProductQuery::default()
            };
            match state.api().list_products(&query).await {
                Ok(page) => page
                    .items
                    .iter()
                    .filter(|p| p.id != product_id)
                    .take(RELATED_LIMIT)
                    .map(ProductCard::from)
                    .collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load related products");
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let mut view = ProductView::from(&product);
    view.specs = filtered_specs(&product, &query.spec);

    Ok(ProductShowTemplate {
        ctx,
        rating: product
            .average_rating()
            .map(|avg| format!("{avg:.1} / 5 ({} reviews)", product.reviews.len())),
        reviews: product.reviews.iter().map(ReviewView::from).collect(),
        product: view,
        in_cart,
        is_favorite,
        related,
        spec_filter: query.spec.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stars_clamps_rating() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(0), "☆☆☆☆☆");
        assert_eq!(stars(9), "★★★★★");
    }
}
