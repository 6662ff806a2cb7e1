//! Database operations.
//!
//! # Tables
//!
//! - `users` - Customer and admin accounts (soft-deleted via `status`)
//! - `loan_types` - Loan product catalog
//! - `applications` - Loan applications and their review state
//! - `transactions` - Append-only ledger with running balances
//! - `otp_codes` - Hashed one-time phone verification codes
//! - `pending_oauth_signups` - First-time OAuth profiles awaiting confirmation
//! - `dashboard_metrics`, `loan_type_performance`, `loan_status_distribution` -
//!   Regenerated dashboard aggregates
//! - `tower_sessions.session` - Session storage
//!
//! All queries are built at runtime (`sqlx::query_as` and `QueryBuilder`), so
//! the crate compiles without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p ubuntu-lend-cli -- migrate
//! ```

pub mod applications;
pub mod loan_types;
pub mod metrics;
pub mod otp;
pub mod pending_signups;
pub mod query;
pub mod transactions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use applications::ApplicationRepository;
pub use loan_types::LoanTypeRepository;
pub use metrics::MetricsRepository;
pub use otp::OtpRepository;
pub use pending_signups::PendingSignupRepository;
pub use transactions::TransactionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
///
/// `describe` receives the violated constraint name so callers can say which
/// field collided.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    describe: impl FnOnce(Option<&str>) -> String,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(describe(db_err.constraint()));
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
