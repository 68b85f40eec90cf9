//! Duka API client.
//!
//! Typed access to the remote commerce REST API that both web frontends and
//! the CLI sit on top of.
//!
//! # Architecture
//!
//! - The API is the source of truth; nothing is stored locally
//! - Public catalog reads are cached in memory via `moka` (5 minute TTL)
//! - Admin mutations drop the catalog cache so edits show up immediately
//! - Authenticated calls take an [`AccessToken`] obtained from [`ApiClient::login`]
//!
//! # Example
//!
//! ```rust,ignore
//! use duka_api_client::{ApiClient, ApiConfig, OrderQuery, ProductQuery};
//!
//! let client = ApiClient::new(&ApiConfig::from_env()?)?;
//! let page = client.list_products(&ProductQuery::default()).await?;
//!
//! let session = client.login("amina@example.com", &password).await?;
//! let orders = client.my_orders(&session.access_token, &OrderQuery::page(1, 10, None)).await?;
//! ```

mod cache;
mod client;
mod config;
mod error;
pub mod payment;
pub mod types;

pub use client::ApiClient;
pub use config::{ApiConfig, ConfigError};
pub use error::ApiError;
pub use payment::{PaymentOutcome, PaymentPoller};
pub use types::*;
