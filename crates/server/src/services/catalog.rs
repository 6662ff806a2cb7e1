//! Cached loan product catalog.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::db::{LoanTypeRepository, RepositoryError};
use crate::models::loan_type::LoanType;

const CATALOG_TTL: Duration = Duration::from_secs(300);

/// In-process cache of the active loan types.
///
/// Entries live for 5 minutes; admin writes call [`LoanCatalog::invalidate`].
#[derive(Clone)]
pub struct LoanCatalog {
    cache: Cache<(), Arc<Vec<LoanType>>>,
}

impl LoanCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(CATALOG_TTL)
                .build(),
        }
    }

    /// Active loan types, loading them on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the catalog cannot be loaded.
    pub async fn active(&self, pool: &PgPool) -> Result<Arc<Vec<LoanType>>, RepositoryError> {
        if let Some(cached) = self.cache.get(&()).await {
            return Ok(cached);
        }
        let loan_types = Arc::new(LoanTypeRepository::new(pool).list(false).await?);
        self.cache.insert((), Arc::clone(&loan_types)).await;
        tracing::debug!(count = loan_types.len(), "Loan catalog cached");
        Ok(loan_types)
    }

    /// Drop the cached catalog.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for LoanCatalog {
    fn default() -> Self {
        Self::new()
    }
}
