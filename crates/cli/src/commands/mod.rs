//! `ul-cli` subcommands.
//!
//! Every command connects with `DATABASE_URL`, loaded from `.env` when present.

pub mod admin;
pub mod cleanup;
pub mod metrics;
pub mod migrate;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use ubuntu_lend_server::db::RepositoryError;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No user with email: {0}")]
    UserNotFound(String),
}

/// Connect to the database named by `DATABASE_URL`.
///
/// # Errors
///
/// Returns `CommandError` if the variable is missing or the connection fails.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(ubuntu_lend_server::db::create_pool(&SecretString::from(database_url)).await?)
}
