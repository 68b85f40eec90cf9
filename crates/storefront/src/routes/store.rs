//! Product listing with search and category filters.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use duka_api_client::{Category, ProductQuery, Subcategory};
use duka_core::{CategoryId, SubcategoryId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::state::AppState;
use crate::views::{PageContext, Pagination, ProductCard, query_string};

/// Products per listing page.
pub const PAGE_SIZE: u32 = 8;

/// Query parameters for `/store`.
#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub search: Option<String>,
    pub category: Option<i64>,
    pub subcategory: Option<i64>,
    pub page: Option<u32>,
}

/// A filter choice in the sidebar.
#[derive(Clone)]
pub struct FilterOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

impl FilterOption {
    fn category(category: &Category, selected: Option<i64>) -> Self {
        Self {
            id: category.id.as_i64(),
            name: category.name.clone(),
            selected: selected == Some(category.id.as_i64()),
        }
    }

    fn subcategory(subcategory: &Subcategory, selected: Option<i64>) -> Self {
        Self {
            id: subcategory.id.as_i64(),
            name: subcategory.name.clone(),
            selected: selected == Some(subcategory.id.as_i64()),
        }
    }
}

/// Store listing template.
#[derive(Template, WebTemplate)]
#[template(path = "store/index.html")]
pub struct StoreTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCard>,
    pub total: u64,
    pub search: String,
    pub categories: Vec<FilterOption>,
    pub subcategories: Vec<FilterOption>,
    pub category: Option<i64>,
    pub pagination: Pagination,
}

/// Display the product listing.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<StoreQuery>,
) -> Result<StoreTemplate> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let page = query.page.unwrap_or(1).max(1);

    let product_query = ProductQuery {
        search: search.clone(),
        page: Some(page),
        limit: Some(PAGE_SIZE),
        category_id: query.category.map(CategoryId::new),
        subcategory_id: query.subcategory.map(SubcategoryId::new),
        ids: Vec::new(),
    };

    let (products, categories) = tokio::join!(
        state.api().list_products(&product_query),
        state.api().list_categories()
    );
    let products = products?;
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories for filters");
        Vec::new()
    });

    let subcategories = match query.category {
        Some(id) => state
            .api()
            .list_subcategories(Some(CategoryId::new(id)))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load subcategories for filters");
                Vec::new()
            }),
        None => Vec::new(),
    };

    let pagination = Pagination::new(&products, |p| {
        format!(
            "/store{}",
            query_string(&[
                ("search", search.clone()),
                ("category", query.category.map(|c| c.to_string())),
                ("subcategory", query.subcategory.map(|s| s.to_string())),
                ("page", Some(p.to_string())),
            ])
        )
    });

    Ok(StoreTemplate {
        ctx,
        products: products.items.iter().map(ProductCard::from).collect(),
        total: products.total,
        search: search.unwrap_or_default(),
        categories: categories
            .iter()
            .map(|c| FilterOption::category(c, query.category))
            .collect(),
        subcategories: subcategories
            .iter()
            .map(|s| FilterOption::subcategory(s, query.subcategory))
            .collect(),
        category: query.category,
        pagination,
    })
}
