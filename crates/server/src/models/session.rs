//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use ubuntu_lend_core::{Email, PhoneNumber, UserId, UserStatus};

use super::user::User;

/// Session-stored user identity.
///
/// Refreshed from the users table on every gated request, so role and status
/// changes made by an admin take effect on the user's next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub phone: Option<PhoneNumber>,
    pub name: String,
    pub is_admin: bool,
    pub status: UserStatus,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            phone: user.phone.clone(),
            name: user.full_name(),
            is_admin: user.is_admin,
            status: user.status,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the OAuth `state` parameter (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the page to return to after an OAuth round trip.
    pub const OAUTH_CALLBACK_URL: &str = "oauth_callback_url";
}
