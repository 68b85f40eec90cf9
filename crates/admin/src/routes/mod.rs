//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Commerce API reachable
//!
//! # Auth (API accounts with the admin or SUPERADMIN role)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login
//! POST /auth/logout            - Logout
//!
//! # Dashboard
//! GET  /                       - Counts and recent orders
//!
//! # Products
//! GET  /products               - Product table (search, category, page)
//! GET  /products/new           - New product form
//! POST /products               - Create product
//! GET  /products/spec-fields   - Specification inputs for a subcategory (HTMX)
//! GET  /products/{id}/edit     - Edit form with images and specifications
//! POST /products/{id}          - Update product
//! POST /products/{id}/delete   - Delete product
//! POST /products/{id}/images   - Upload and attach an image (multipart)
//! POST /products/{id}/images/{image_id}/delete - Detach an image
//! POST /products/recalculate-ratings - Recompute ratings from reviews
//!
//! # Categories
//! GET  /categories             - Categories with their subcategories
//! POST /categories             - Create category
//! POST /categories/{id}        - Update category
//! POST /categories/{id}/delete - Delete category
//! POST /subcategories          - Create subcategory
//! POST /subcategories/{id}     - Update subcategory
//! POST /subcategories/{id}/delete - Delete subcategory
//!
//! # Specifications
//! GET  /subcategories/{id}/specifications                  - Definitions
//! POST /subcategories/{id}/specifications                  - Create
//! POST /subcategories/{id}/specifications/{spec_id}        - Update
//! POST /subcategories/{id}/specifications/{spec_id}/delete - Delete
//!
//! # Orders
//! GET  /orders                 - All orders (status, search, page)
//! GET  /orders/{id}            - Order detail
//! POST /orders/{id}/status     - Change status (HTMX returns the badge)
//!
//! # Banners
//! GET  /banners                - Banners with edit forms
//! POST /banners                - Create banner (multipart, image required)
//! POST /banners/{id}           - Update banner (multipart, image optional)
//! POST /banners/{id}/toggle    - Show or hide
//! POST /banners/{id}/remove-image - Drop the image
//! POST /banners/{id}/delete    - Delete banner
//!
//! # Users (super admins only; others get 403)
//! GET  /users                  - Accounts with role counts (search, role, page)
//! POST /users                  - Create admin account
//! POST /users/{id}/delete      - Delete admin or customer account
//! ```

pub mod auth;
pub mod banners;
pub mod categories;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod products;
pub mod specifications;
pub mod uploads;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use duka_core::validation::MAX_IMAGE_BYTES;

use crate::state::AppState;

/// Room for multipart framing around the largest accepted image.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new_form))
        .route("/spec-fields", get(products::spec_fields))
        .route("/{id}", post(products::update))
        .route("/{id}/edit", get(products::edit_form))
        .route("/{id}/delete", post(products::delete))
        .route("/recalculate-ratings", post(products::recalculate_ratings))
        .route(
            "/{id}/images",
            post(products::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/{id}/images/{image_id}/delete", post(products::delete_image))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(categories::index).post(categories::create))
        .route("/categories/{id}", post(categories::update))
        .route("/categories/{id}/delete", post(categories::delete))
        .route("/subcategories", post(categories::create_subcategory))
        .route("/subcategories/{id}", post(categories::update_subcategory))
        .route("/subcategories/{id}/delete", post(categories::delete_subcategory))
        .route(
            "/subcategories/{id}/specifications",
            get(specifications::index).post(specifications::create),
        )
        .route(
            "/subcategories/{id}/specifications/{spec_id}",
            post(specifications::update),
        )
        .route(
            "/subcategories/{id}/specifications/{spec_id}/delete",
            post(specifications::delete),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
}

fn banner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banners::index).post(banners::create))
        .route("/{id}", post(banners::update))
        .route("/{id}/toggle", post(banners::toggle))
        .route("/{id}/remove-image", post(banners::remove_image))
        .route("/{id}/delete", post(banners::delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index).post(users::create))
        .route("/{id}/delete", post(users::delete))
}

/// Build the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/banners", banner_routes())
        .nest("/users", user_routes())
        .merge(category_routes())
}
