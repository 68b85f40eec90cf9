//! Duka Core - Shared types library.
//!
//! This crate provides common types used across all Duka components:
//! - `storefront` - Customer-facing shop
//! - `admin` - Catalog and order administration
//! - `cli` - Operator tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, phone numbers and statuses
//! - [`cart`] - Session cart with stock-capped quantities
//! - [`delivery`] - Delivery and payment method choices, regional delivery fees
//! - [`checkout`] - Checkout selection validation and order summaries
//! - [`specification`] - Product specification formatting
//! - [`review`] - Star ratings and which purchases still await a review
//! - [`validation`] - Admin form validation rules
//! - [`secret`] - Strength rules for session signing secrets

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod review;
pub mod secret;
pub mod specification;
pub mod types;
pub mod validation;

pub use types::*;
