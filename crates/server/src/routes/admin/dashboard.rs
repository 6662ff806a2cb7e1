//! Admin dashboard metrics.

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{AppQuery, Result};
use crate::middleware::RequireAdmin;
use crate::models::metrics::DashboardSnapshot;
use crate::response::ApiResponse;
use crate::routes::params::empty_string_as_none;
use crate::services::DashboardService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    /// Day to regenerate, today when absent.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date: Option<NaiveDate>,
}

/// Latest stored metrics, computed for today if none exist yet.
///
/// # Route
///
/// `GET /api/admin/dashboard`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<DashboardSnapshot>> {
    let snapshot = DashboardService::new(state.pool()).latest().await?;
    Ok(ApiResponse::ok(snapshot))
}

/// # Route
///
/// `POST /api/admin/dashboard/refresh?date=YYYY-MM-DD`
pub async fn refresh(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppQuery(query): AppQuery<RefreshQuery>,
) -> Result<ApiResponse<DashboardSnapshot>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let snapshot = DashboardService::new(state.pool()).refresh(date).await?;
    tracing::info!(admin_id = %admin.id, %date, "Dashboard metrics refreshed");
    Ok(ApiResponse::ok(snapshot))
}
