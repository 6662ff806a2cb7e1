//! Dashboard aggregate storage.
//!
//! Aggregates are computed entirely in SQL and written per `metric_date`.
//! Counts include rows created up to the end of that date; statuses are
//! taken as they stand when the refresh runs.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::instrument;

use super::RepositoryError;
use crate::models::metrics::{
    DashboardMetrics, DashboardSnapshot, LoanStatusDistribution, LoanTypePerformance,
};

const UPSERT_DASHBOARD: &str = r"
INSERT INTO dashboard_metrics (
    metric_date, total_users, new_users, total_applications, pending_applications,
    approved_applications, rejected_applications, active_loans, total_disbursed,
    total_repaid, outstanding_balance, approval_rate, default_rate, generated_at
)
SELECT
    $1::date,
    (SELECT COUNT(*) FROM users WHERE status <> 'deleted' AND created_at < $1::date + 1),
    (SELECT COUNT(*) FROM users WHERE created_at >= $1::date AND created_at < $1::date + 1),
    a.total,
    a.pending,
    a.approved,
    a.rejected,
    a.active,
    COALESCE((SELECT SUM(amount) FROM transactions
              WHERE kind = 'disbursement' AND created_at < $1::date + 1), 0),
    COALESCE((SELECT SUM(amount) FROM transactions
              WHERE kind = 'repayment' AND created_at < $1::date + 1), 0),
    COALESCE((SELECT SUM(latest.balance_after) FROM (
                  SELECT DISTINCT ON (t.application_id) t.balance_after
                  FROM transactions t
                  JOIN applications ap ON ap.id = t.application_id
                  WHERE ap.status IN ('disbursed', 'defaulted')
                  ORDER BY t.application_id, t.id DESC
              ) latest), 0),
    CASE WHEN a.reviewed = 0 THEN 0
         ELSE ROUND(100.0 * (a.reviewed - a.rejected) / a.reviewed, 2) END,
    CASE WHEN a.ever_disbursed = 0 THEN 0
         ELSE ROUND(100.0 * a.defaulted / a.ever_disbursed, 2) END,
    NOW()
FROM (
    SELECT
        COUNT(*) AS total,
        COUNT(*) FILTER (WHERE status = 'pending') AS pending,
        COUNT(*) FILTER (WHERE status IN ('approved', 'disbursed', 'completed', 'defaulted')) AS approved,
        COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
        COUNT(*) FILTER (WHERE status IN ('disbursed', 'defaulted')) AS active,
        COUNT(*) FILTER (WHERE status <> 'pending') AS reviewed,
        COUNT(*) FILTER (WHERE status IN ('disbursed', 'completed', 'defaulted')) AS ever_disbursed,
        COUNT(*) FILTER (WHERE status = 'defaulted') AS defaulted
    FROM applications
    WHERE created_at < $1::date + 1
) a
ON CONFLICT (metric_date) DO UPDATE SET
    total_users = EXCLUDED.total_users,
    new_users = EXCLUDED.new_users,
    total_applications = EXCLUDED.total_applications,
    pending_applications = EXCLUDED.pending_applications,
    approved_applications = EXCLUDED.approved_applications,
    rejected_applications = EXCLUDED.rejected_applications,
    active_loans = EXCLUDED.active_loans,
    total_disbursed = EXCLUDED.total_disbursed,
    total_repaid = EXCLUDED.total_repaid,
    outstanding_balance = EXCLUDED.outstanding_balance,
    approval_rate = EXCLUDED.approval_rate,
    default_rate = EXCLUDED.default_rate,
    generated_at = EXCLUDED.generated_at
";

const INSERT_LOAN_TYPE_PERFORMANCE: &str = r"
INSERT INTO loan_type_performance (
    metric_date, loan_type_id, application_count, approved_count,
    total_requested, total_disbursed, average_amount
)
SELECT
    $1::date,
    lt.id,
    COUNT(a.id),
    COUNT(a.id) FILTER (WHERE a.status IN ('approved', 'disbursed', 'completed', 'defaulted')),
    COALESCE(SUM(a.amount), 0),
    COALESCE(SUM(a.disbursed_amount), 0),
    COALESCE(ROUND(AVG(a.amount), 2), 0)
FROM loan_types lt
LEFT JOIN applications a ON a.loan_type_id = lt.id AND a.created_at < $1::date + 1
GROUP BY lt.id
";

const INSERT_STATUS_DISTRIBUTION: &str = r"
INSERT INTO loan_status_distribution (metric_date, status, count, total_amount)
SELECT $1::date, status, COUNT(*), COALESCE(SUM(amount), 0)
FROM applications
WHERE created_at < $1::date + 1
GROUP BY status
";

/// Repository for dashboard aggregates.
pub struct MetricsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MetricsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Recompute every aggregate for `date` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self, date: NaiveDate) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(UPSERT_DASHBOARD)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM loan_type_performance WHERE metric_date = $1")
            .bind(date)
            .execute(&mut *tx)
            .await?;
        sqlx::query(INSERT_LOAN_TYPE_PERFORMANCE)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM loan_status_distribution WHERE metric_date = $1")
            .bind(date)
            .execute(&mut *tx)
            .await?;
        sqlx::query(INSERT_STATUS_DISTRIBUTION)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%date, "Dashboard metrics refreshed");
        Ok(())
    }

    /// Most recent date with stored aggregates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_date(&self) -> Result<Option<NaiveDate>, RepositoryError> {
        let date: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(metric_date) FROM dashboard_metrics")
                .fetch_one(self.pool)
                .await?;
        Ok(date)
    }

    /// Stored aggregates for `date`, if a refresh has run for it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn snapshot(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DashboardSnapshot>, RepositoryError> {
        let metrics = sqlx::query_as::<_, DashboardMetrics>(
            "SELECT metric_date, total_users, new_users, total_applications, \
                 pending_applications, approved_applications, rejected_applications, \
                 active_loans, total_disbursed, total_repaid, outstanding_balance, \
                 approval_rate, default_rate, generated_at \
             FROM dashboard_metrics WHERE metric_date = $1",
        )
        .bind(date)
        .fetch_optional(self.pool)
        .await?;

        let Some(metrics) = metrics else {
            return Ok(None);
        };

        let loan_types = sqlx::query_as::<_, LoanTypePerformance>(
            "SELECT p.loan_type_id, lt.name AS loan_type_name, p.application_count, \
                 p.approved_count, p.total_requested, p.total_disbursed, p.average_amount \
             FROM loan_type_performance p \
             JOIN loan_types lt ON lt.id = p.loan_type_id \
             WHERE p.metric_date = $1 \
             ORDER BY p.total_requested DESC, lt.name ASC",
        )
        .bind(date)
        .fetch_all(self.pool)
        .await?;

        let status_distribution = sqlx::query_as::<_, LoanStatusDistribution>(
            "SELECT status, count, total_amount FROM loan_status_distribution \
             WHERE metric_date = $1 ORDER BY status",
        )
        .bind(date)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(DashboardSnapshot {
            metrics,
            loan_types,
            status_distribution,
        }))
    }
}
