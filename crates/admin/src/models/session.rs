//! Session-related types for admin authentication.

use duka_api_client::AccessToken;
use duka_core::{Role, UserId};
use serde::{Deserialize, Serialize};

/// Session-stored staff identity.
///
/// Only accounts whose API role is `admin` or `SUPERADMIN` get one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Bearer token for the commerce API.
    pub token: AccessToken,
}

impl CurrentAdmin {
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self.role, Role::SuperAdmin)
    }
}

/// Session keys for admin data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// One-shot messages for the next page.
    pub const FLASHES: &str = "flashes";
}
