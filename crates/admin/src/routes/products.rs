//! Product management.
//!
//! The product form is parsed field by field so every problem comes back
//! at once, next to the input it belongs to. Specification values travel
//! as `spec_<id>` fields.

use std::collections::HashMap;
use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{
    ApiError, Category, Product, ProductInput, ProductQuery, SpecificationValue,
    Subcategory,
};
use duka_core::specification::Specification;
use duka_core::validation::{
    FieldError, MAX_PRODUCT_IMAGES, ProductDraft, ValidationError, validate_image,
    validate_image_count, validate_product,
};
use duka_core::{CategoryId, ImageId, Price, ProductId, SpecificationId, SubcategoryId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, is_rejection};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{Flash, push_flash};
use crate::state::AppState;
use crate::views::{PageContext, Pagination, non_empty, query_string};

use super::uploads::{first_message, read_multipart};

const PAGE_SIZE: u32 = 20;
const SPEC_FIELD_PREFIX: &str = "spec_";

// =============================================================================
// Listing
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
}

/// Product row for the table.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: String,
    pub stock_quantity: u32,
    pub image_url: Option<String>,
    pub is_new: bool,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            brand: product.brand.clone().unwrap_or_default(),
            category: product
                .category
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            price: product.price.display(),
            stock_quantity: product.stock_quantity,
            image_url: product.primary_image().map(str::to_string),
            is_new: product.is_new,
        }
    }
}

/// A `<select>` entry.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

fn category_options(categories: &[Category], selected: Option<i64>) -> Vec<SelectOption> {
    categories
        .iter()
        .map(|c| SelectOption {
            id: c.id.as_i64(),
            name: c.name.clone(),
            selected: selected == Some(c.id.as_i64()),
        })
        .collect()
}

/// Subcategories labelled with their parent, e.g. `Electronics / Phones`.
fn subcategory_options(
    categories: &[Category],
    subcategories: &[Subcategory],
    selected: Option<i64>,
) -> Vec<SelectOption> {
    subcategories
        .iter()
        .map(|s| {
            let parent = categories
                .iter()
                .find(|c| c.id == s.category_id)
                .map_or("?", |c| c.name.as_str());
            SelectOption {
                id: s.id.as_i64(),
                name: format!("{parent} / {}", s.name),
                selected: selected == Some(s.id.as_i64()),
            }
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductRow>,
    pub categories: Vec<SelectOption>,
    pub search: String,
    pub pagination: Pagination,
}

/// Products list page handler.
#[instrument(skip(state, ctx, _admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<ProductsQuery>,
) -> Result<ProductsIndexTemplate> {
    let category = query
        .category
        .as_deref()
        .and_then(|c| c.trim().parse::<i64>().ok());
    let search = non_empty(query.search.as_deref());
    let product_query = ProductQuery {
        search: search.clone(),
        page: Some(query.page.unwrap_or(1).max(1)),
        limit: Some(PAGE_SIZE),
        category_id: category.map(CategoryId::new),
        ..ProductQuery::default()
    };

    let (result, categories) = tokio::try_join!(
        state.api().list_products(&product_query),
        state.api().list_categories(),
    )?;

    let pagination = Pagination::new(&result, |page| {
        format!(
            "/products{}",
            query_string(&[
                ("search", search.clone()),
                ("category", category.map(|c| c.to_string())),
                ("page", Some(page.to_string())),
            ])
        )
    });

    Ok(ProductsIndexTemplate {
        ctx,
        products: result.items.iter().map(ProductRow::from).collect(),
        categories: category_options(&categories, category),
        search: search.unwrap_or_default(),
        pagination,
    })
}

// =============================================================================
// Form
// =============================================================================

/// Product form fields, as typed.
#[derive(Debug, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub price: String,
    pub original_price: Option<String>,
    #[serde(default)]
    pub stock_quantity: String,
    #[serde(default)]
    pub barcode: String,
    pub discount: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    /// Checkbox; present when ticked.
    pub is_new: Option<String>,
    /// `spec_<id>` inputs.
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

struct FieldParser {
    errors: Vec<FieldError>,
}

impl FieldParser {
    fn parse<T: FromStr + Default>(&mut self, field: &'static str, label: &str, raw: &str) -> T {
        raw.trim().parse().unwrap_or_else(|_| {
            self.errors.push(FieldError {
                field,
                message: format!("{label} must be a number"),
            });
            T::default()
        })
    }

    fn parse_optional<T: FromStr + Default>(
        &mut self,
        field: &'static str,
        label: &str,
        raw: Option<&str>,
    ) -> Option<T> {
        non_empty(raw).map(|value| self.parse(field, label, &value))
    }
}

impl ProductForm {
    /// Parse and check the form into an API body.
    ///
    /// # Errors
    ///
    /// Returns every unparseable or invalid field.
    pub fn to_input(&self) -> std::result::Result<ProductInput, ValidationError> {
        let mut parser = FieldParser { errors: Vec::new() };
        let draft = ProductDraft {
            name: self.name.trim().to_string(),
            cost: parser.parse("cost", "Cost", &self.cost),
            price: parser.parse("price", "Price", &self.price),
            original_price: parser.parse_optional(
                "original_price",
                "Original price",
                self.original_price.as_deref(),
            ),
            stock_quantity: parser.parse("stock_quantity", "Stock quantity", &self.stock_quantity),
            barcode: parser.parse("barcode", "Barcode", &self.barcode),
            discount: parser
                .parse_optional("discount", "Discount", self.discount.as_deref())
                .unwrap_or(Decimal::ZERO),
        };
        let category_id: Option<i64> =
            parser.parse_optional("category_id", "Category", self.category_id.as_deref());
        let subcategory_id: Option<i64> =
            parser.parse_optional("subcategory_id", "Subcategory", self.subcategory_id.as_deref());

        let mut errors = parser.errors;
        if let Err(invalid) = validate_product(&draft) {
            // A field that did not parse keeps its parse message
            let unparsed: Vec<&str> = errors.iter().map(|e| e.field).collect();
            let fresh: Vec<FieldError> = invalid
                .errors
                .into_iter()
                .filter(|e| !unparsed.contains(&e.field))
                .collect();
            errors.extend(fresh);
        }
        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        Ok(ProductInput {
            name: draft.name,
            cost: Price::new(draft.cost),
            price: Price::new(draft.price),
            original_price: draft.original_price.map(Price::new),
            stock_quantity: draft.stock_quantity,
            barcode: draft.barcode,
            category_id: category_id.map(CategoryId::new),
            subcategory_id: subcategory_id.map(SubcategoryId::new),
            brand: non_empty(self.brand.as_deref()),
            description: non_empty(self.description.as_deref()),
            discount: draft.discount,
            is_new: self.is_new.is_some(),
            images: Vec::new(),
            specifications: self.spec_values(),
        })
    }

    /// Filled-in specification values, ordered by specification id.
    #[must_use]
    pub fn spec_values(&self) -> Vec<SpecificationValue> {
        let mut values: Vec<SpecificationValue> = self
            .extra
            .iter()
            .filter_map(|(key, value)| {
                let id = key.strip_prefix(SPEC_FIELD_PREFIX)?.parse::<i64>().ok()?;
                let value = value.trim();
                (!value.is_empty()).then(|| SpecificationValue {
                    specification_id: SpecificationId::new(id),
                    value: value.to_string(),
                })
            })
            .collect();
        values.sort_by_key(|v| v.specification_id.as_i64());
        values
    }

    fn selected_subcategory(&self) -> Option<i64> {
        non_empty(self.subcategory_id.as_deref()).and_then(|s| s.parse().ok())
    }
}

/// Form values for re-display.
#[derive(Debug, Clone, Default)]
pub struct ProductFormView {
    pub name: String,
    pub cost: String,
    pub price: String,
    pub original_price: String,
    pub stock_quantity: String,
    pub barcode: String,
    pub discount: String,
    pub brand: String,
    pub description: String,
    pub is_new: bool,
}

impl From<&ProductForm> for ProductFormView {
    fn from(form: &ProductForm) -> Self {
        Self {
            name: form.name.clone(),
            cost: form.cost.clone(),
            price: form.price.clone(),
            original_price: form.original_price.clone().unwrap_or_default(),
            stock_quantity: form.stock_quantity.clone(),
            barcode: form.barcode.clone(),
            discount: form.discount.clone().unwrap_or_default(),
            brand: form.brand.clone().unwrap_or_default(),
            description: form.description.clone().unwrap_or_default(),
            is_new: form.is_new.is_some(),
        }
    }
}

impl From<&Product> for ProductFormView {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            cost: product.cost.amount().normalize().to_string(),
            price: product.price.amount().normalize().to_string(),
            original_price: product
                .original_price
                .map(|p| p.amount().normalize().to_string())
                .unwrap_or_default(),
            stock_quantity: product.stock_quantity.to_string(),
            barcode: product.barcode.to_string(),
            discount: product.discount.normalize().to_string(),
            brand: product.brand.clone().unwrap_or_default(),
            description: product.description.clone().unwrap_or_default(),
            is_new: product.is_new,
        }
    }
}

/// A specification input on the product form.
#[derive(Debug, Clone)]
pub struct SpecInput {
    pub field: String,
    pub name: String,
    pub input_type: &'static str,
    pub value: String,
}

fn spec_inputs(
    definitions: &[Specification],
    value_of: impl Fn(SpecificationId) -> String,
) -> Vec<SpecInput> {
    definitions
        .iter()
        .map(|definition| SpecInput {
            field: format!("{SPEC_FIELD_PREFIX}{}", definition.id),
            name: definition.name.clone(),
            input_type: if definition.value_type.eq_ignore_ascii_case("number") {
                "number"
            } else {
                "text"
            },
            value: value_of(definition.id),
        })
        .collect()
}

/// An attached image on the edit page.
#[derive(Debug, Clone)]
pub struct ImageView {
    pub id: i64,
    pub url: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub ctx: PageContext,
    /// `None` on the create form.
    pub product_id: Option<i64>,
    pub form: ProductFormView,
    pub errors: ValidationError,
    pub categories: Vec<SelectOption>,
    pub subcategories: Vec<SelectOption>,
    pub specs: Vec<SpecInput>,
    pub images: Vec<ImageView>,
    pub max_images: usize,
}

impl ProductFormTemplate {
    /// Form action URL.
    #[must_use]
    pub fn action(&self) -> String {
        self.product_id
            .map_or_else(|| "/products".to_string(), |id| format!("/products/{id}"))
    }

    #[must_use]
    pub fn can_add_image(&self) -> bool {
        self.images.len() < self.max_images
    }

    /// Error for a field, or an empty string.
    #[must_use]
    pub fn error_for(&self, field: &str) -> &str {
        self.errors.for_field(field).unwrap_or_default()
    }
}

/// Specification inputs fragment (HTMX), swapped in when the subcategory changes.
#[derive(Template, WebTemplate)]
#[template(path = "partials/spec_fields.html")]
pub struct SpecFieldsTemplate {
    pub specs: Vec<SpecInput>,
}

struct FormData {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    definitions: Vec<Specification>,
}

async fn load_form_data(state: &AppState, subcategory: Option<i64>) -> Result<FormData> {
    let (categories, subcategories) = tokio::try_join!(
        state.api().list_categories(),
        state.api().list_subcategories(None),
    )?;
    let definitions = match subcategory {
        Some(id) => state.api().list_specifications(SubcategoryId::new(id)).await?,
        None => Vec::new(),
    };
    Ok(FormData {
        categories,
        subcategories,
        definitions,
    })
}

/// Re-render the form with the submitted values and field errors.
async fn form_with_errors(
    state: &AppState,
    ctx: PageContext,
    product_id: Option<ProductId>,
    form: &ProductForm,
    errors: ValidationError,
) -> Result<Response> {
    let subcategory = form.selected_subcategory();
    let data = load_form_data(state, subcategory).await?;
    let category = non_empty(form.category_id.as_deref()).and_then(|c| c.parse().ok());
    let images = match product_id {
        Some(id) => state.api().product_images(id).await?,
        None => Vec::new(),
    };

    let template = ProductFormTemplate {
        ctx,
        product_id: product_id.map(|id| id.as_i64()),
        form: ProductFormView::from(form),
        errors,
        categories: category_options(&data.categories, category),
        subcategories: subcategory_options(&data.categories, &data.subcategories, subcategory),
        specs: spec_inputs(&data.definitions, |id| {
            form.extra
                .get(&format!("{SPEC_FIELD_PREFIX}{id}"))
                .cloned()
                .unwrap_or_default()
        }),
        images: images
            .iter()
            .map(|i| ImageView {
                id: i.id.as_i64(),
                url: i.img_url.clone(),
            })
            .collect(),
        max_images: MAX_PRODUCT_IMAGES,
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct NewProductQuery {
    pub subcategory: Option<i64>,
}

/// New product form.
#[instrument(skip(state, ctx, _admin))]
pub async fn new_form(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<NewProductQuery>,
) -> Result<ProductFormTemplate> {
    let data = load_form_data(&state, query.subcategory).await?;
    Ok(ProductFormTemplate {
        ctx,
        product_id: None,
        form: ProductFormView::default(),
        errors: ValidationError::default(),
        categories: category_options(&data.categories, None),
        subcategories: subcategory_options(&data.categories, &data.subcategories, query.subcategory),
        specs: spec_inputs(&data.definitions, |_| String::new()),
        images: Vec::new(),
        max_images: MAX_PRODUCT_IMAGES,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SpecFieldsQuery {
    pub subcategory_id: Option<String>,
}

/// Specification inputs for the chosen subcategory.
pub async fn spec_fields(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<SpecFieldsQuery>,
) -> Result<SpecFieldsTemplate> {
    let subcategory = non_empty(query.subcategory_id.as_deref()).and_then(|s| s.parse::<i64>().ok());
    let definitions = match subcategory {
        Some(id) => state.api().list_specifications(SubcategoryId::new(id)).await?,
        None => Vec::new(),
    };
    Ok(SpecFieldsTemplate {
        specs: spec_inputs(&definitions, |_| String::new()),
    })
}

/// Create a product.
#[instrument(skip(state, ctx, session, admin, form))]
pub async fn create(
    State(state): State<AppState>,
    ctx: PageContext,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return form_with_errors(&state, ctx, None, &form, errors).await,
    };

    match state.api().create_product(&admin.token, &input).await {
        Ok(()) => {
            tracing::info!(name = %input.name, "Product created");
            push_flash(&session, Flash::success(format!("Created {}", input.name))).await;
            Ok(Redirect::to("/products").into_response())
        }
        Err(e) if is_rejection(&e) => {
            let errors = api_rejection(&e);
            form_with_errors(&state, ctx, None, &form, errors).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit form with images and specification values.
#[instrument(skip(state, ctx, _admin))]
pub async fn edit_form(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<ProductFormTemplate> {
    let product = state.api().get_product(ProductId::new(id)).await?;
    let subcategory = product.subcategory_id.map(|s| s.as_i64());
    let data = load_form_data(&state, subcategory).await?;

    let specs = spec_inputs(&data.definitions, |spec_id| {
        product
            .product_specifications
            .iter()
            .find(|s| s.specification_id == spec_id)
            .map(|s| s.value.clone())
            .unwrap_or_default()
    });

    Ok(ProductFormTemplate {
        ctx,
        product_id: Some(id),
        form: ProductFormView::from(&product),
        errors: ValidationError::default(),
        categories: category_options(&data.categories, product.category_id.map(|c| c.as_i64())),
        subcategories: subcategory_options(&data.categories, &data.subcategories, subcategory),
        specs,
        images: product
            .images
            .iter()
            .map(|i| ImageView {
                id: i.id.as_i64(),
                url: i.img_url.clone(),
            })
            .collect(),
        max_images: MAX_PRODUCT_IMAGES,
    })
}

/// Update a product, then store its specification values.
#[instrument(skip(state, ctx, session, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    ctx: PageContext,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let mut input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return form_with_errors(&state, ctx, Some(product_id), &form, errors).await,
    };
    let specifications = std::mem::take(&mut input.specifications);

    match state.api().update_product(&admin.token, product_id, &input).await {
        Ok(()) => {}
        Err(e) if is_rejection(&e) => {
            let errors = api_rejection(&e);
            return form_with_errors(&state, ctx, Some(product_id), &form, errors).await;
        }
        Err(e) => return Err(e.into()),
    }

    // The product itself is saved; a refused value is reported, not fatal
    let mut saved = 0;
    for value in &specifications {
        match state
            .api()
            .add_product_specification(&admin.token, product_id, value)
            .await
        {
            Ok(_) => saved += 1,
            Err(e) if e.is_auth_error() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    specification_id = %value.specification_id,
                    "Specification value not saved"
                );
                push_flash(
                    &session,
                    Flash::error(format!(
                        "Could not save specification {}: {}",
                        value.specification_id,
                        e.user_message()
                    )),
                )
                .await;
            }
        }
    }

    tracing::info!(product_id = id, specs = saved, "Product updated");
    push_flash(&session, Flash::success("Product updated")).await;
    Ok(Redirect::to(&format!("/products/{id}/edit")).into_response())
}

/// Delete a product.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    match state.api().delete_product(&admin.token, ProductId::new(id)).await {
        Ok(()) => {
            tracing::info!(product_id = id, "Product deleted");
            push_flash(&session, Flash::success("Product deleted")).await;
        }
        Err(e) if is_rejection(&e) => {
            push_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/products").into_response())
}

/// Recompute every product's average rating from its reviews.
#[instrument(skip(state, session, admin))]
pub async fn recalculate_ratings(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<Response> {
    let result = state.api().recalculate_ratings(&admin.token).await?;
    tracing::info!(
        updated = result.products_updated,
        total = result.total_products,
        "Product ratings recalculated"
    );
    let message = format!(
        "Ratings recalculated: {} of {} products updated",
        result.products_updated, result.total_products
    );
    push_flash(&session, Flash::success(message)).await;
    Ok(Redirect::to("/products").into_response())
}

// =============================================================================
// Images
// =============================================================================

/// Upload an image and attach it to the product.
#[instrument(skip(state, session, admin, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let edit_url = format!("/products/{id}/edit");

    let Some(upload) = read_multipart(multipart).await?.file else {
        push_flash(&session, Flash::error("Please choose an image to upload")).await;
        return Ok(Redirect::to(&edit_url).into_response());
    };

    let existing = state.api().product_images(product_id).await?;
    let checked = validate_image_count(existing.len()).and_then(|()| {
        validate_image(&upload.file_name, &upload.content_type, upload.bytes.len())
    });
    if let Err(errors) = checked {
        push_flash(&session, Flash::error(first_message(&errors))).await;
        return Ok(Redirect::to(&edit_url).into_response());
    }

    let uploaded = state
        .api()
        .upload_image(&admin.token, &upload.file_name, &upload.content_type, upload.bytes)
        .await?;
    state
        .api()
        .add_product_image(&admin.token, product_id, &uploaded.img_url)
        .await?;

    tracing::info!(product_id = id, url = %uploaded.img_url, "Image attached");
    push_flash(&session, Flash::success("Image uploaded")).await;
    Ok(Redirect::to(&edit_url).into_response())
}

/// Detach an image.
#[instrument(skip(state, session, admin))]
pub async fn delete_image(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Result<Response> {
    state
        .api()
        .delete_product_image(&admin.token, ProductId::new(id), ImageId::new(image_id))
        .await?;
    push_flash(&session, Flash::success("Image removed")).await;
    Ok(Redirect::to(&format!("/products/{id}/edit")).into_response())
}

// =============================================================================
// Helpers
// =============================================================================

fn api_rejection(error: &ApiError) -> ValidationError {
    ValidationError {
        errors: vec![FieldError {
            field: "form",
            message: error.user_message(),
        }],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: "Kikoy Beach Towel".to_string(),
            cost: "900".to_string(),
            price: "1500".to_string(),
            original_price: Some(String::new()),
            stock_quantity: "12".to_string(),
            barcode: "600123".to_string(),
            discount: Some("10".to_string()),
            brand: Some("  ".to_string()),
            description: None,
            category_id: Some("3".to_string()),
            subcategory_id: Some(String::new()),
            is_new: Some("on".to_string()),
            extra: HashMap::from([
                ("spec_7".to_string(), " Cotton ".to_string()),
                ("spec_2".to_string(), "150x90cm".to_string()),
                ("spec_9".to_string(), String::new()),
                ("unrelated".to_string(), "x".to_string()),
            ]),
        }
    }

    #[test]
    fn test_to_input_parses_fields() {
        let input = form().to_input().unwrap();
        assert_eq!(input.price, Price::from_shillings(1500));
        assert_eq!(input.original_price, None);
        assert_eq!(input.category_id, Some(CategoryId::new(3)));
        assert_eq!(input.subcategory_id, None);
        assert_eq!(input.brand, None);
        assert!(input.is_new);
        assert_eq!(input.discount, Decimal::TEN);
    }

    #[test]
    fn test_spec_values_skip_blank_and_sort() {
        let values = form().spec_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].specification_id, SpecificationId::new(2));
        assert_eq!(values[1].value, "Cotton");
    }

    #[test]
    fn test_unparseable_field_keeps_parse_message() {
        let bad = ProductForm {
            price: "abc".to_string(),
            stock_quantity: "-1".to_string(),
            name: String::new(),
            ..form()
        };
        let errors = bad.to_input().unwrap_err();
        assert_eq!(errors.for_field("price"), Some("Price must be a number"));
        assert_eq!(
            errors.for_field("stock_quantity"),
            Some("Stock quantity cannot be negative")
        );
        assert_eq!(errors.for_field("name"), Some("Product name is required"));
        assert_eq!(errors.errors.iter().filter(|e| e.field == "price").count(), 1);
    }
}
