//! Category landing pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use duka_api_client::{BannerKind, ProductQuery};
use duka_core::{CategoryId, SubcategoryId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::store::PAGE_SIZE;
use crate::state::AppState;
use crate::views::{BannerView, PageContext, Pagination, ProductCard, query_string};

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub subcategory: Option<i64>,
    pub page: Option<u32>,
}

/// Subcategory filter tab.
#[derive(Clone)]
pub struct SubcategoryTab {
    pub url: String,
    pub name: String,
    pub selected: bool,
}

/// Category page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub banners: Vec<BannerView>,
    pub all_url: String,
    pub showing_all: bool,
    pub tabs: Vec<SubcategoryTab>,
    pub products: Vec<ProductCard>,
    pub pagination: Pagination,
}

/// Display a category with its products, optionally narrowed to one subcategory.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<i64>,
    Query(query): Query<CategoryQuery>,
) -> Result<CategoryTemplate> {
    let category_id = CategoryId::new(id);
    let categories = state.api().list_categories().await?;
    let category = categories
        .into_iter()
        .find(|c| c.id == category_id)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;

    let page = query.page.unwrap_or(1).max(1);
    let product_query = ProductQuery {
        page: Some(page),
        limit: Some(PAGE_SIZE),
        category_id: Some(category_id),
        subcategory_id: query.subcategory.map(SubcategoryId::new),
        ..ProductQuery::default()
    };

    let (products, subcategories, banners) = tokio::join!(
        state.api().list_products(&product_query),
        state.api().list_subcategories(Some(category_id)),
        state.api().public_banners(BannerKind::Category, Some(category_id)),
    );
    let products = products?;
    let subcategories = subcategories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load subcategories");
        Vec::new()
    });
    let banners = banners.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load category banners");
        Vec::new()
    });

    let base = format!("/categories/{id}");
    let tabs = subcategories
        .iter()
        .map(|sub| SubcategoryTab {
            url: format!("{base}?subcategory={}", sub.id),
            name: sub.name.clone(),
            selected: query.subcategory == Some(sub.id.as_i64()),
        })
        .collect();

    let pagination = Pagination::new(&products, |p| {
        format!(
            "{base}{}",
            query_string(&[
                ("subcategory", query.subcategory.map(|s| s.to_string())),
                ("page", Some(p.to_string())),
            ])
        )
    });

    Ok(CategoryTemplate {
        ctx,
        title: category.title.clone().unwrap_or_else(|| category.name.clone()),
        subtitle: category.subtitle.clone(),
        description: category.description.clone(),
        features: category.features.clone(),
        banners: BannerView::list(&banners),
        showing_all: query.subcategory.is_none(),
        all_url: base,
        tabs,
        products: products.items.iter().map(ProductCard::from).collect(),
        pagination,
    })
}
