//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::{LoanCatalog, Notifier};

/// Timeout for calls to OAuth providers.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("SMTP setup failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    http: reqwest::Client,
    notifier: Notifier,
    catalog: LoanCatalog,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or SMTP transport cannot be built.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let notifier = Notifier::new(config.email.as_ref())?;
        Self::with_notifier(config, pool, notifier)
    }

    /// Create the state with an explicit notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_notifier(
        config: ServerConfig,
        pool: PgPool,
        notifier: Notifier,
    ) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("ubuntu-lend/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                http,
                notifier,
                catalog: LoanCatalog::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Shared HTTP client for OAuth providers.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn catalog(&self) -> &LoanCatalog {
        &self.inner.catalog
    }
}
