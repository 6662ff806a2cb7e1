//! Admin role management.
//!
//! ```bash
//! ul-cli admin promote --email ops@ubuntulend.com
//! ul-cli admin demote --email ops@ubuntulend.com
//! ```
//!
//! The account must already exist; customers sign up through the site first.

use ubuntu_lend_core::Email;
use ubuntu_lend_server::db::UserRepository;

use super::{CommandError, connect};

/// Grant or revoke admin access for the user with `email`.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no user has that email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidEmail(e.to_string()))?;

    let pool = connect().await?;
    let updated = UserRepository::new(&pool)
        .set_admin_by_email(&email, is_admin)
        .await?;
    if !updated {
        return Err(CommandError::UserNotFound(email.to_string()));
    }

    if is_admin {
        tracing::info!(email = %email, "Granted admin access");
    } else {
        tracing::info!(email = %email, "Revoked admin access");
    }
    Ok(())
}
