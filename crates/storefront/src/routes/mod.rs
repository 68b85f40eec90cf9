//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health, /health/ready     - Health checks
//!
//! # Catalog
//! GET  /store                     - Product listing (search, category, subcategory, page)
//! GET  /products/{id}             - Product detail
//! GET  /categories/{id}           - Category page with subcategory filter
//!
//! # Cart (HTMX fragments)
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add a product (count badge, triggers cart-updated)
//! POST /cart/increase             - +1 (cart items fragment)
//! POST /cart/decrease             - -1, removes at 1 (cart items fragment)
//! POST /cart/remove               - Remove a line (cart items fragment)
//! POST /cart/clear                - Empty the cart
//! GET  /cart/count                - Count badge fragment
//!
//! # Wishlist (requires auth)
//! GET  /wishlist                  - Favorites
//! POST /wishlist/toggle           - Add or remove a favorite
//!
//! # Checkout and payment (requires auth)
//! GET  /checkout                  - Delivery, address and payment choices
//! GET  /checkout/summary          - Totals fragment for the current choices
//! POST /checkout                  - Place the order
//! GET  /payment                   - M-Pesa form
//! POST /payment                   - Send the STK push
//! GET  /payment/status            - Poll fragment (HX-Redirect on success)
//! GET  /order-confirmation        - Confirmation
//!
//! # Orders (requires auth)
//! GET  /orders                    - Orders overview, status filter
//! GET  /orders/{id}               - Order detail
//! POST /orders/{id}/cancel        - Ask staff to cancel
//!
//! # Account (requires auth)
//! GET  /account                   - Profile, default address, recent orders
//! GET  /account/addresses         - Address book
//! POST /account/addresses         - Create
//! POST /account/addresses/{id}    - Update
//! POST /account/addresses/{id}/delete
//! POST /account/addresses/{id}/default
//!
//! # Reviews (requires auth)
//! GET  /account/reviews           - Pending and written reviews
//! POST /reviews                   - Review a delivered product
//! POST /reviews/{id}              - Update
//! POST /reviews/{id}/delete
//!
//! # Auth
//! GET  /auth/login, POST /auth/login
//! GET  /auth/register, POST /auth/register
//! POST /auth/logout
//! GET  /auth/check-email          - After registering; resend form
//! POST /auth/resend-verification
//! GET  /auth/verify-email         - Emailed link; logs the customer in
//! GET  /auth/forgot-password, POST /auth/forgot-password
//! GET  /auth/reset-password       - Emailed link; new password form
//! POST /auth/reset-password
//!
//! # Assistant
//! POST /assistant                 - Ask Makena (answer fragment)
//!
//! # Newsletter
//! POST /newsletter                - Footer sign-up (result fragment)
//! ```

pub mod account;
pub mod assistant;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod health;
pub mod home;
pub mod newsletter;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reviews;
pub mod store;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/logout", post(auth::logout))
        .route("/check-email", get(auth::check_email))
        .route("/verify-email", get(auth::verify_email))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset-password", get(auth::reset_password_page))
        .merge(limited)
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/increase", post(cart::increase))
        .route("/decrease", post(cart::decrease))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout and payment routes router.
pub fn checkout_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/payment", post(payment::initiate))
        .route_layer(payment_rate_limiter());

    Router::new()
        .route("/checkout", get(checkout::show).post(checkout::place_order))
        .route("/checkout/summary", get(checkout::summary))
        .route("/payment", get(payment::show))
        .route("/payment/status", get(payment::status))
        .route("/order-confirmation", get(checkout::confirmation))
        .merge(limited)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::overview))
        .route("/reviews", get(reviews::index))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(reviews::create))
        .route("/{id}", post(reviews::update))
        .route("/{id}/delete", post(reviews::delete))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/store", get(store::index))
        .route("/products/{id}", get(products::show))
        .route("/categories/{id}", get(categories::show))
        .nest("/cart", cart_routes())
        .route("/wishlist", get(wishlist::index))
        .route("/wishlist/toggle", post(wishlist::toggle))
        .merge(checkout_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/reviews", review_routes())
        .nest("/auth", auth_routes())
        .route("/assistant", post(assistant::ask))
        .route("/newsletter", post(newsletter::subscribe))
}
