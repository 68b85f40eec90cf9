//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use duka_api_client::{BannerKind, Category, ProductQuery};
use tracing::instrument;

use crate::filters;
use crate::state::AppState;
use crate::views::{BannerView, PageContext, ProductCard};

/// How many products the home page asks the API for.
const FEATURED_LIMIT: u32 = 12;

/// Category tile on the home page.
#[derive(Clone)]
pub struct CategoryLink {
    pub id: i64,
    pub name: String,
    pub subtitle: Option<String>,
}

impl From<&Category> for CategoryLink {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.as_i64(),
            name: category.title.clone().unwrap_or_else(|| category.name.clone()),
            subtitle: category.subtitle.clone(),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub banners: Vec<BannerView>,
    pub new_arrivals: Vec<ProductCard>,
    pub categories: Vec<CategoryLink>,
}

/// Display the home page.
///
/// A catalog outage leaves the sections empty rather than failing the page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> impl IntoResponse {
    let query = ProductQuery {
        limit: Some(FEATURED_LIMIT),
        ..ProductQuery::default()
    };

    let (products, categories, banners) = tokio::join!(
        state.api().list_products(&query),
        state.api().list_categories(),
        state.api().public_banners(BannerKind::Homepage, None),
    );

    let products = products.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load featured products");
        duka_api_client::Paginated {
            items: Vec::new(),
            total: 0,
            page: 1,
            limit: FEATURED_LIMIT,
            pages: 0,
        }
    });
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });
    let banners = banners.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load banners");
        Vec::new()
    });

    // New products first; fill up with the rest so the section is never sparse
    let (mut new_arrivals, rest): (Vec<_>, Vec<_>) =
        products.items.iter().partition(|p| p.is_new);
    new_arrivals.extend(rest);

    HomeTemplate {
        ctx,
        banners: BannerView::list(&banners),
        new_arrivals: new_arrivals.into_iter().take(8).map(ProductCard::from).collect(),
        categories: categories.iter().map(CategoryLink::from).collect(),
    }
}
