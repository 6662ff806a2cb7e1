//! Database migration command.
//!
//! ```bash
//! ul-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time. The server never applies them itself.

use super::{CommandError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the connection or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
