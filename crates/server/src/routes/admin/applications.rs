//! Admin application review.

use axum::extract::State;

use ubuntu_lend_core::ApplicationId;

use crate::db::ApplicationRepository;
use crate::error::{AppError, AppJson, AppPath, AppQuery, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::application::{Application, ApplicationSummary, StatusUpdate};
use crate::response::ApiResponse;
use crate::routes::params::ApplicationQuery;
use crate::services::LendingService;
use crate::state::AppState;

/// # Route
///
/// `GET /api/admin/applications`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    AppQuery(query): AppQuery<ApplicationQuery>,
) -> Result<ApiResponse<Vec<ApplicationSummary>>> {
    let page = query.page_request();
    let applications = ApplicationRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(ApiResponse::page(applications, page))
}

/// # Route
///
/// `GET /api/admin/applications/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<ApplicationSummary>> {
    let application = ApplicationRepository::new(state.pool())
        .get_summary(ApplicationId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    Ok(ApiResponse::ok(application))
}

/// Approve, reject, disburse, complete or default an application.
///
/// Rejections need a `rejectionReason`.
///
/// # Route
///
/// `PATCH /api/admin/applications/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
    AppJson(update): AppJson<StatusUpdate>,
) -> Result<ApiResponse<Application>> {
    let application = LendingService::new(state.pool())
        .review(ApplicationId::new(id), &update, admin.id, state.notifier())
        .await?;
    add_breadcrumb(
        "admin",
        "Application status changed",
        &[
            ("application_id", &application.id.to_string()),
            ("status", application.status.as_str()),
        ],
    );
    Ok(ApiResponse::ok(application))
}
