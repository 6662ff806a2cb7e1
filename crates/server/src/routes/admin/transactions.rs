//! Admin view of the repayment ledger.

use axum::extract::State;

use crate::db::TransactionRepository;
use crate::db::transactions::Recorded;
use crate::error::{AppJson, AppQuery, Result};
use crate::middleware::RequireAdmin;
use crate::models::transaction::{RecordTransaction, TransactionSummary};
use crate::response::ApiResponse;
use crate::routes::params::TransactionQuery;
use crate::services::LendingService;
use crate::state::AppState;

/// # Route
///
/// `GET /api/admin/transactions`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    AppQuery(query): AppQuery<TransactionQuery>,
) -> Result<ApiResponse<Vec<TransactionSummary>>> {
    let page = query.page_request();
    let entries = TransactionRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(ApiResponse::page(entries, page))
}

/// Record a repayment or fee.
///
/// # Route
///
/// `POST /api/admin/transactions`
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppJson(request): AppJson<RecordTransaction>,
) -> Result<ApiResponse<Recorded>> {
    let recorded = LendingService::new(state.pool())
        .record_transaction(&request, admin.id)
        .await?;
    Ok(ApiResponse::created(recorded))
}
