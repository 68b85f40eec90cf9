//! Integration tests for Duka.
//!
//! Every test boots its own in-memory commerce API ([`MockApi`]) on a random
//! port and points the real storefront or admin router at it, so nothing
//! external has to be running.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p duka-integration-tests
//! ```
//!
//! # Test Suites
//!
//! - `api_client` - REST client decoding, error mapping and caching
//! - `payment_polling` - M-Pesa confirmation polling
//! - `storefront_checkout` - cart, checkout and payment through the storefront
//! - `storefront_account` - verification, password reset, addresses, wishlist,
//!   reviews and the newsletter
//! - `storefront_catalog` - banners and the shopping assistant
//! - `admin_orders` - staff login and order status changes
//! - `admin_catalog` - products, categories, specifications, images and banners
//! - `admin_users` - account management for super admins

pub mod apps;
pub mod mock_api;

pub use apps::{TestServer, location, spawn_admin, spawn_storefront, spawn_storefront_with};
pub use mock_api::{MockApi, MockOrder, MockState};
