//! Promotional banners for the home and category pages.
//!
//! Banner forms are multipart: the text fields travel with an optional image
//! that is uploaded first and saved by URL.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use duka_api_client::{ApiError, Banner, BannerInput, BannerKind, Category};
use duka_core::validation::validate_image;
use duka_core::{BannerId, CategoryId};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, is_rejection};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{CurrentAdmin, Flash, push_flash};
use crate::state::AppState;
use crate::views::PageContext;

use super::products::SelectOption;
use super::uploads::{MultipartForm, Upload, first_message, read_multipart};

const BANNERS_PATH: &str = "/banners";

/// Banner placement choice.
#[derive(Debug, Clone)]
pub struct KindOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn kind_options(selected: BannerKind) -> Vec<KindOption> {
    BannerKind::ALL
        .iter()
        .map(|kind| KindOption {
            value: kind.as_str(),
            label: kind.label(),
            selected: *kind == selected,
        })
        .collect()
}

/// A banner card with its edit form.
#[derive(Debug, Clone)]
pub struct BannerRow {
    pub id: i64,
    pub image_url: String,
    pub title: String,
    pub subtitle: String,
    pub button_text: String,
    pub placement: String,
    pub active: bool,
    pub kinds: Vec<KindOption>,
    pub categories: Vec<SelectOption>,
}

impl BannerRow {
    fn new(banner: &Banner, categories: &[Category]) -> Self {
        let category_name = banner
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.as_str());
        let placement = match (banner.kind, category_name) {
            (BannerKind::Category, Some(name)) => format!("Category: {name}"),
            (kind, _) => kind.label().to_string(),
        };
        Self {
            id: banner.id.as_i64(),
            image_url: banner.image_url.clone(),
            title: banner.title.clone().unwrap_or_default(),
            subtitle: banner.subtitle.clone().unwrap_or_default(),
            button_text: banner.button_text.clone().unwrap_or_default(),
            placement,
            active: banner.active,
            kinds: kind_options(banner.kind),
            categories: category_options(categories, banner.category_id),
        }
    }
}

fn category_options(categories: &[Category], selected: Option<CategoryId>) -> Vec<SelectOption> {
    categories
        .iter()
        .map(|c| SelectOption {
            id: c.id.as_i64(),
            name: c.name.clone(),
            selected: selected == Some(c.id),
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "banners/index.html")]
pub struct BannersTemplate {
    pub ctx: PageContext,
    pub banners: Vec<BannerRow>,
    pub kinds: Vec<KindOption>,
    pub categories: Vec<SelectOption>,
}

/// The text half of a banner form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BannerFields {
    title: Option<String>,
    subtitle: Option<String>,
    button_text: Option<String>,
    kind: BannerKind,
    category_id: Option<CategoryId>,
    active: bool,
}

impl BannerFields {
    fn parse(form: &MultipartForm) -> std::result::Result<Self, String> {
        let optional = |name: &str| Some(form.text(name).to_string()).filter(|v| !v.is_empty());
        let kind: BannerKind = form
            .text("type")
            .parse()
            .map_err(|_| "Please choose where the banner is shown".to_string())?;
        let category_id = match kind {
            BannerKind::Homepage => None,
            BannerKind::Category => Some(
                form.text("category_id")
                    .parse::<CategoryId>()
                    .map_err(|_| "Please choose a category for a category banner".to_string())?,
            ),
        };
        Ok(Self {
            title: optional("title"),
            subtitle: optional("subtitle"),
            button_text: optional("button_text"),
            kind,
            category_id,
            active: form.checked("active"),
        })
    }

    fn into_input(self, image_url: String) -> BannerInput {
        BannerInput {
            image_url,
            title: self.title,
            subtitle: self.subtitle,
            active: self.active,
            kind: self.kind,
            category_id: self.category_id,
            button_text: self.button_text,
        }
    }
}

/// Flash the result and go back to the banner list.
async fn finish<T>(
    session: &Session,
    outcome: std::result::Result<T, ApiError>,
    success: &str,
) -> Result<Response> {
    let flash = match outcome {
        Ok(_) => Flash::success(success),
        Err(e) if is_rejection(&e) => Flash::error(e.user_message()),
        Err(e) => return Err(e.into()),
    };
    push_flash(session, flash).await;
    Ok(Redirect::to(BANNERS_PATH).into_response())
}

async fn invalid(session: &Session, message: String) -> Result<Response> {
    push_flash(session, Flash::error(message)).await;
    Ok(Redirect::to(BANNERS_PATH).into_response())
}

/// Check and upload an image, returning its URL or the message to flash.
async fn store_image(
    state: &AppState,
    admin: &CurrentAdmin,
    upload: Upload,
) -> Result<std::result::Result<String, String>> {
    if let Err(errors) = validate_image(&upload.file_name, &upload.content_type, upload.bytes.len()) {
        return Ok(Err(first_message(&errors)));
    }
    match state
        .api()
        .upload_image(&admin.token, &upload.file_name, &upload.content_type, upload.bytes)
        .await
    {
        Ok(uploaded) => Ok(Ok(uploaded.img_url)),
        Err(e) if is_rejection(&e) => Ok(Err(e.user_message())),
        Err(e) => Err(e.into()),
    }
}

async fn find_banner(state: &AppState, admin: &CurrentAdmin, id: i64) -> Result<Option<Banner>> {
    let banners = state.api().list_banners(&admin.token).await?;
    Ok(banners.into_iter().find(|b| b.id.as_i64() == id))
}

/// Banner list with create and edit forms.
#[instrument(skip(state, ctx, admin))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<BannersTemplate> {
    let (banners, categories) = tokio::join!(
        state.api().list_banners(&admin.token),
        state.api().list_categories(),
    );
    let banners = banners?;
    let categories = categories?;

    Ok(BannersTemplate {
        ctx,
        banners: banners.iter().map(|b| BannerRow::new(b, &categories)).collect(),
        kinds: kind_options(BannerKind::Homepage),
        categories: category_options(&categories, None),
    })
}

/// Create a banner; an image is required.
#[instrument(skip(state, session, admin, multipart))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = read_multipart(multipart).await?;
    let fields = match BannerFields::parse(&form) {
        Ok(fields) => fields,
        Err(message) => return invalid(&session, message).await,
    };
    let Some(upload) = form.file.take() else {
        return invalid(&session, "Please upload an image".to_string()).await;
    };
    let image_url = match store_image(&state, &admin, upload).await? {
        Ok(url) => url,
        Err(message) => return invalid(&session, message).await,
    };

    let outcome = state
        .api()
        .create_banner(&admin.token, &fields.into_input(image_url))
        .await;
    if let Ok(banner) = &outcome {
        tracing::info!(banner_id = %banner.id, "Banner created");
    }
    finish(&session, outcome, "Banner created").await
}

/// Update a banner, replacing the image when a new one is chosen.
#[instrument(skip(state, session, admin, multipart))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = read_multipart(multipart).await?;
    let fields = match BannerFields::parse(&form) {
        Ok(fields) => fields,
        Err(message) => return invalid(&session, message).await,
    };
    let Some(existing) = find_banner(&state, &admin, id).await? else {
        return invalid(&session, "Banner not found".to_string()).await;
    };
    let image_url = match form.file.take() {
        Some(upload) => match store_image(&state, &admin, upload).await? {
            Ok(url) => url,
            Err(message) => return invalid(&session, message).await,
        },
        None => existing.image_url,
    };

    let outcome = state
        .api()
        .update_banner(&admin.token, existing.id, &fields.into_input(image_url))
        .await;
    finish(&session, outcome, "Banner updated").await
}

/// Switch a banner on or off.
#[instrument(skip(state, session, admin))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let Some(existing) = find_banner(&state, &admin, id).await? else {
        return invalid(&session, "Banner not found".to_string()).await;
    };
    let mut input = existing.to_input();
    input.active = !existing.active;
    let message = if input.active {
        "Banner activated"
    } else {
        "Banner deactivated"
    };
    let outcome = state.api().update_banner(&admin.token, existing.id, &input).await;
    finish(&session, outcome, message).await
}

/// Drop a banner's image, keeping the banner.
#[instrument(skip(state, session, admin))]
pub async fn remove_image(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let outcome = state
        .api()
        .remove_banner_image(&admin.token, BannerId::new(id))
        .await;
    finish(&session, outcome, "Banner image removed").await
}

/// Delete a banner.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let outcome = state.api().delete_banner(&admin.token, BannerId::new(id)).await;
    if outcome.is_ok() {
        tracing::info!(banner_id = id, "Banner deleted");
    }
    finish(&session, outcome, "Banner deleted").await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> MultipartForm {
        let mut form = MultipartForm::default();
        for (name, value) in pairs {
            form.fields.insert((*name).to_string(), (*value).to_string());
        }
        form
    }

    #[test]
    fn test_homepage_banner_drops_category() {
        let fields = BannerFields::parse(&form(&[
            ("type", "homepage"),
            ("category_id", "2"),
            ("title", " Long rains sale "),
            ("subtitle", ""),
            ("active", "on"),
        ]))
        .unwrap();
        assert_eq!(fields.kind, BannerKind::Homepage);
        assert_eq!(fields.category_id, None);
        assert_eq!(fields.title.as_deref(), Some("Long rains sale"));
        assert_eq!(fields.subtitle, None);
        assert!(fields.active);
    }

    #[test]
    fn test_category_banner_needs_category() {
        assert_eq!(
            BannerFields::parse(&form(&[("type", "category")])).unwrap_err(),
            "Please choose a category for a category banner"
        );
        let fields = BannerFields::parse(&form(&[("type", "category"), ("category_id", "2")])).unwrap();
        assert_eq!(fields.category_id, Some(CategoryId::new(2)));
        assert!(!fields.active);
    }

    #[test]
    fn test_unknown_placement_rejected() {
        assert_eq!(
            BannerFields::parse(&form(&[("type", "sidebar")])).unwrap_err(),
            "Please choose where the banner is shown"
        );
    }
}
