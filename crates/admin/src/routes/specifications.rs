//! Specification definitions for a subcategory.
//!
//! A definition names an attribute (RAM, screen size) and the kind of
//! input the product form shows for it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::SpecificationInput;
use duka_core::specification::{Specification, search_definitions};
use duka_core::validation::validate_specification;
use duka_core::{SpecificationId, SubcategoryId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, is_rejection};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::PageContext;

/// Input kinds the product form knows how to render.
pub const VALUE_TYPES: [&str; 2] = ["text", "number"];

#[derive(Debug, Default, Deserialize)]
pub struct SpecificationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value_type: String,
}

impl SpecificationForm {
    /// Check the form and build the API body.
    ///
    /// # Errors
    ///
    /// Returns the first problem as a staff-facing message.
    pub fn to_input(
        &self,
        subcategory_id: SubcategoryId,
    ) -> std::result::Result<SpecificationInput, String> {
        if let Err(errors) = validate_specification(&self.name, &self.value_type) {
            return Err(errors
                .errors
                .first()
                .map_or_else(|| errors.to_string(), |e| e.message.clone()));
        }
        let value_type = self.value_type.trim().to_ascii_lowercase();
        if !VALUE_TYPES.contains(&value_type.as_str()) {
            return Err("Value type must be text or number".to_string());
        }
        Ok(SpecificationInput {
            name: self.name.trim().to_string(),
            value_type,
            subcategory_id,
        })
    }
}

/// `<option>` for the value type select.
#[derive(Debug, Clone)]
pub struct ValueTypeOption {
    pub value: &'static str,
    pub selected: bool,
}

fn value_type_options(selected: &str) -> Vec<ValueTypeOption> {
    VALUE_TYPES
        .iter()
        .map(|&value| ValueTypeOption {
            value,
            selected: value.eq_ignore_ascii_case(selected),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SpecificationView {
    pub id: i64,
    pub name: String,
    pub value_types: Vec<ValueTypeOption>,
}

impl From<&Specification> for SpecificationView {
    fn from(spec: &Specification) -> Self {
        Self {
            id: spec.id.as_i64(),
            name: spec.name.clone(),
            value_types: value_type_options(&spec.value_type),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "specifications/index.html")]
pub struct SpecificationsTemplate {
    pub ctx: PageContext,
    pub subcategory_id: i64,
    pub subcategory_name: String,
    pub category_name: String,
    pub specifications: Vec<SpecificationView>,
    pub value_types: Vec<ValueTypeOption>,
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpecificationSearch {
    #[serde(default)]
    pub q: String,
}

/// Definitions for one subcategory.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(subcategory_id): Path<i64>,
    Query(search): Query<SpecificationSearch>,
) -> Result<SpecificationsTemplate> {
    let id = SubcategoryId::new(subcategory_id);
    let (categories, subcategories, specifications) = tokio::try_join!(
        state.api().list_categories(),
        state.api().list_subcategories(None),
        state.api().list_specifications(id),
    )?;
    let subcategory = subcategories
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("subcategory {subcategory_id}")))?;
    let category_name = categories
        .iter()
        .find(|c| c.id == subcategory.category_id)
        .map(|c| c.name.clone())
        .unwrap_or_default();

    Ok(SpecificationsTemplate {
        ctx,
        subcategory_id,
        subcategory_name: subcategory.name.clone(),
        category_name,
        specifications: search_definitions(&specifications, &search.q)
            .into_iter()
            .map(SpecificationView::from)
            .collect(),
        value_types: value_type_options("text"),
        q: search.q.trim().to_string(),
    })
}

fn index_path(subcategory_id: i64) -> String {
    format!("/subcategories/{subcategory_id}/specifications")
}

/// Create a definition.
#[instrument(skip(state, session, admin, form))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(subcategory_id): Path<i64>,
    Form(form): Form<SpecificationForm>,
) -> Result<Response> {
    let flash = match form.to_input(SubcategoryId::new(subcategory_id)) {
        Ok(input) => match state.api().create_specification(&admin.token, &input).await {
            Ok(spec) => Flash::success(format!("Added {}", spec.name)),
            Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
            Err(e) => return Err(e.into()),
        },
        Err(message) => Flash::error(message),
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(&index_path(subcategory_id)).into_response())
}

/// Rename a definition or change its value type.
#[instrument(skip(state, session, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path((subcategory_id, spec_id)): Path<(i64, i64)>,
    Form(form): Form<SpecificationForm>,
) -> Result<Response> {
    let flash = match form.to_input(SubcategoryId::new(subcategory_id)) {
        Ok(input) => match state
            .api()
            .update_specification(&admin.token, SpecificationId::new(spec_id), &input)
            .await
        {
            Ok(_) => Flash::success("Specification updated"),
            Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
            Err(e) => return Err(e.into()),
        },
        Err(message) => Flash::error(message),
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(&index_path(subcategory_id)).into_response())
}

/// Delete a definition.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path((subcategory_id, spec_id)): Path<(i64, i64)>,
) -> Result<Response> {
    let flash = match state
        .api()
        .delete_specification(
            &admin.token,
            SubcategoryId::new(subcategory_id),
            SpecificationId::new(spec_id),
        )
        .await
    {
        Ok(()) => Flash::success("Specification deleted"),
        Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
        Err(e) => return Err(e.into()),
    };
    push_flash(&session, flash).await;
    Ok(Redirect::to(&index_path(subcategory_id)).into_response())
}
