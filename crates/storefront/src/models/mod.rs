//! Session-backed models for the storefront.

pub mod flash;
pub mod session;

pub use flash::{Flash, FlashLevel, push_flash, take_flashes};
pub use session::{CurrentCustomer, PendingPayment, PendingVerification, keys as session_keys};
