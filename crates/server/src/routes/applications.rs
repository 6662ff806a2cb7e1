//! Customer loan applications.

use axum::extract::State;

use ubuntu_lend_core::ApplicationId;

use super::params::PageParams;
use crate::db::ApplicationRepository;
use crate::error::{AppError, AppJson, AppPath, AppQuery, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::application::{Application, ApplicationFilter, ApplicationSummary};
use crate::response::ApiResponse;
use crate::services::{LendingService, SubmitApplication};
use crate::state::AppState;

/// Submit an application. It starts out `pending`.
///
/// # Route
///
/// `POST /api/applications`
pub async fn submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    AppJson(request): AppJson<SubmitApplication>,
) -> Result<ApiResponse<Application>> {
    let application = LendingService::new(state.pool())
        .submit(user.id, &request)
        .await?;
    add_breadcrumb(
        "application",
        "Application submitted",
        &[("application_id", &application.id.to_string())],
    );
    Ok(ApiResponse::ok(application))
}

/// The signed-in user's applications, newest first.
///
/// # Route
///
/// `GET /api/applications`
pub async fn list_own(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<ApiResponse<Vec<ApplicationSummary>>> {
    let filter = ApplicationFilter {
        user_id: Some(user.id),
        ..ApplicationFilter::default()
    };
    let page = params.request();
    let applications = ApplicationRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(ApiResponse::page(applications, page))
}

/// One of the signed-in user's applications. Other users' are 404.
///
/// # Route
///
/// `GET /api/applications/{id}`
pub async fn show_own(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    AppPath(id): AppPath<i32>,
) -> Result<ApiResponse<Application>> {
    let application = ApplicationRepository::new(state.pool())
        .get_for_user(ApplicationId::new(id), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    Ok(ApiResponse::ok(application))
}
