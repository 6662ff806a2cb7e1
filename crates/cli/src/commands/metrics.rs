//! Dashboard metrics regeneration.
//!
//! ```bash
//! # Today (UTC)
//! ul-cli metrics refresh
//!
//! # A specific day
//! ul-cli metrics refresh --date 2026-03-31
//! ```
//!
//! Meant for a daily cron job; re-running for the same date overwrites it.

use chrono::{NaiveDate, Utc};

use ubuntu_lend_server::services::DashboardService;

use super::{CommandError, connect};

/// Recompute the dashboard aggregates for `date`, defaulting to today.
///
/// # Errors
///
/// Returns `CommandError` if the connection or an aggregate query fails.
pub async fn refresh(date: Option<NaiveDate>) -> Result<(), CommandError> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let pool = connect().await?;
    let snapshot = DashboardService::new(&pool).refresh(date).await?;

    tracing::info!(
        date = %date,
        total_users = snapshot.metrics.total_users,
        total_applications = snapshot.metrics.total_applications,
        active_loans = snapshot.metrics.active_loans,
        "Dashboard metrics refreshed"
    );
    Ok(())
}
