//! Expired auth record cleanup.
//!
//! ```bash
//! ul-cli cleanup
//! ```

use ubuntu_lend_server::db::{OtpRepository, PendingSignupRepository};

use super::{CommandError, connect};

/// Delete expired one-time codes and pending OAuth sign-ups.
///
/// # Errors
///
/// Returns `CommandError` if the connection or a delete fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    let codes = OtpRepository::new(&pool).purge_expired().await?;
    let signups = PendingSignupRepository::new(&pool).purge_expired().await?;

    tracing::info!(codes, signups, "Expired auth records deleted");
    Ok(())
}
