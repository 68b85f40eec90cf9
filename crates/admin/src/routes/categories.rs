//! Category and subcategory management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{ApiError, Category, CategoryInput, Subcategory, SubcategoryInput};
use duka_core::validation::validate_category_name;
use duka_core::{CategoryId, SubcategoryId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, is_rejection};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{PageContext, non_empty};

const CATEGORIES_PATH: &str = "/categories";

/// Category form. Features are one per line.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub features: Option<String>,
}

impl CategoryForm {
    /// Check the form and build the API body.
    ///
    /// # Errors
    ///
    /// Returns the problem as a staff-facing message.
    pub fn to_input(&self) -> std::result::Result<CategoryInput, String> {
        validate_category_name(&self.name).map_err(|e| first_error(&e))?;

        let features: Vec<String> = self
            .features
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(CategoryInput {
            name: self.name.trim().to_string(),
            title: non_empty(self.title.as_deref()),
            subtitle: non_empty(self.subtitle.as_deref()),
            description: non_empty(self.description.as_deref()),
            features: (!features.is_empty()).then_some(features),
        })
    }
}

/// Subcategory form.
#[derive(Debug, Default, Deserialize)]
pub struct SubcategoryForm {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: String,
}

impl SubcategoryForm {
    /// Check the form and build the API body.
    ///
    /// # Errors
    ///
    /// Returns the problem as a staff-facing message.
    pub fn to_input(&self) -> std::result::Result<SubcategoryInput, String> {
        validate_category_name(&self.name).map_err(|e| first_error(&e))?;
        let category_id = self
            .category_id
            .trim()
            .parse::<i64>()
            .map_err(|_| "Please choose a category".to_string())?;

        Ok(SubcategoryInput {
            name: self.name.trim().to_string(),
            description: non_empty(self.description.as_deref()),
            category_id: CategoryId::new(category_id),
        })
    }
}

fn first_error(errors: &duka_core::validation::ValidationError) -> String {
    errors
        .errors
        .first()
        .map_or_else(|| errors.to_string(), |e| e.message.clone())
}

/// Subcategory row under its category.
#[derive(Debug, Clone)]
pub struct SubcategoryView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category_id: i64,
}

impl From<&Subcategory> for SubcategoryView {
    fn from(subcategory: &Subcategory) -> Self {
        Self {
            id: subcategory.id.as_i64(),
            name: subcategory.name.clone(),
            description: subcategory.description.clone().unwrap_or_default(),
            category_id: subcategory.category_id.as_i64(),
        }
    }
}

/// Category card with its subcategories.
#[derive(Debug, Clone)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Features joined by newlines for the textarea.
    pub features: String,
    pub subcategories: Vec<SubcategoryView>,
}

impl CategoryView {
    fn new(category: &Category, subcategories: &[Subcategory]) -> Self {
        Self {
            id: category.id.as_i64(),
            name: category.name.clone(),
            title: category.title.clone().unwrap_or_default(),
            subtitle: category.subtitle.clone().unwrap_or_default(),
            description: category.description.clone().unwrap_or_default(),
            features: category.features.join("\n"),
            subcategories: subcategories
                .iter()
                .filter(|s| s.category_id == category.id)
                .map(SubcategoryView::from)
                .collect(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub ctx: PageContext,
    pub categories: Vec<CategoryView>,
}

/// Categories page handler.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(_admin): RequireAdminAuth,
) -> Result<CategoriesTemplate> {
    let (categories, subcategories) = tokio::try_join!(
        state.api().list_categories(),
        state.api().list_subcategories(None),
    )?;

    Ok(CategoriesTemplate {
        ctx,
        categories: categories
            .iter()
            .map(|c| CategoryView::new(c, &subcategories))
            .collect(),
    })
}

/// Flash for a write: success text, the API's refusal, or the error page.
async fn finish<T>(
    session: &Session,
    outcome: std::result::Result<T, ApiError>,
    success: impl Into<String>,
) -> Result<Response> {
    let flash = match outcome {
        Ok(_) => Flash::success(success),
        Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
        Err(e) => return Err(e.into()),
    };
    push_flash(session, flash).await;
    Ok(Redirect::to(CATEGORIES_PATH).into_response())
}

async fn invalid(session: &Session, message: String) -> Result<Response> {
    push_flash(session, Flash::error(message)).await;
    Ok(Redirect::to(CATEGORIES_PATH).into_response())
}

/// Create a category.
#[instrument(skip(state, session, admin, form))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return invalid(&session, message).await,
    };
    let outcome = state.api().create_category(&admin.token, &input).await;
    finish(&session, outcome, format!("Created category {}", input.name)).await
}

/// Update a category.
#[instrument(skip(state, session, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return invalid(&session, message).await,
    };
    let outcome = state
        .api()
        .update_category(&admin.token, CategoryId::new(id), &input)
        .await;
    finish(&session, outcome, "Category updated").await
}

/// Delete a category.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let outcome = state
        .api()
        .delete_category(&admin.token, CategoryId::new(id))
        .await;
    finish(&session, outcome, "Category deleted").await
}

/// Create a subcategory.
#[instrument(skip(state, session, admin, form))]
pub async fn create_subcategory(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Form(form): Form<SubcategoryForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return invalid(&session, message).await,
    };
    let outcome = state.api().create_subcategory(&admin.token, &input).await;
    finish(&session, outcome, format!("Created subcategory {}", input.name)).await
}

/// Update a subcategory.
#[instrument(skip(state, session, admin, form))]
pub async fn update_subcategory(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    Form(form): Form<SubcategoryForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return invalid(&session, message).await,
    };
    let outcome = state
        .api()
        .update_subcategory(&admin.token, SubcategoryId::new(id), &input)
        .await;
    finish(&session, outcome, "Subcategory updated").await
}

/// Delete a subcategory.
#[instrument(skip(state, session, admin))]
pub async fn delete_subcategory(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let outcome = state
        .api()
        .delete_subcategory(&admin.token, SubcategoryId::new(id))
        .await;
    finish(&session, outcome, "Subcategory deleted").await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_features_one_per_line() {
        let form = CategoryForm {
            name: " Electronics ".to_string(),
            title: Some("Latest gadgets".to_string()),
            subtitle: Some(String::new()),
            description: None,
            features: Some("Free delivery in Nairobi\r\n\n  Genuine products \n".to_string()),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.name, "Electronics");
        assert_eq!(input.subtitle, None);
        assert_eq!(
            input.features,
            Some(vec![
                "Free delivery in Nairobi".to_string(),
                "Genuine products".to_string()
            ])
        );
    }

    #[test]
    fn test_blank_names_rejected() {
        let form = CategoryForm {
            features: Some("   ".to_string()),
            ..CategoryForm::default()
        };
        assert_eq!(form.to_input().unwrap_err(), "Name is required");

        let sub = SubcategoryForm {
            name: "Phones".to_string(),
            description: None,
            category_id: "x".to_string(),
        };
        assert_eq!(sub.to_input().unwrap_err(), "Please choose a category");
    }

    #[test]
    fn test_category_view_groups_subcategories() {
        let category = Category {
            id: CategoryId::new(1),
            name: "Electronics".to_string(),
            title: None,
            subtitle: None,
            description: None,
            features: vec!["A".to_string(), "B".to_string()],
        };
        let subcategories = vec![
            Subcategory {
                id: SubcategoryId::new(10),
                name: "Phones".to_string(),
                description: None,
                category_id: CategoryId::new(1),
            },
            Subcategory {
                id: SubcategoryId::new(11),
                name: "Sofas".to_string(),
                description: None,
                category_id: CategoryId::new(2),
            },
        ];
        let view = CategoryView::new(&category, &subcategories);
        assert_eq!(view.features, "A\nB");
        assert_eq!(view.subcategories.len(), 1);
        assert_eq!(view.subcategories[0].name, "Phones");
    }
}
