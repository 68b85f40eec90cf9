//! Session-backed models for admin.

pub mod flash;
pub mod session;

pub use flash::{Flash, FlashLevel, push_flash, take_flashes};
pub use session::{CurrentAdmin, keys as session_keys};
