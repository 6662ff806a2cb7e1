//! Admin dashboard aggregates.

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use crate::db::{MetricsRepository, RepositoryError};
use crate::models::metrics::DashboardSnapshot;

/// Reads and regenerates the stored dashboard aggregates.
pub struct DashboardService<'a> {
    metrics: MetricsRepository<'a>,
}

impl<'a> DashboardService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            metrics: MetricsRepository::new(pool),
        }
    }

    /// The most recent snapshot, computing today's when none has been stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn latest(&self) -> Result<DashboardSnapshot, RepositoryError> {
        if let Some(date) = self.metrics.latest_date().await?
            && let Some(snapshot) = self.metrics.snapshot(date).await?
        {
            return Ok(snapshot);
        }
        self.refresh(Utc::now().date_naive()).await
    }

    /// Recompute the aggregates for `date` and return them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn refresh(&self, date: NaiveDate) -> Result<DashboardSnapshot, RepositoryError> {
        self.metrics.refresh(date).await?;
        self.metrics
            .snapshot(date)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
