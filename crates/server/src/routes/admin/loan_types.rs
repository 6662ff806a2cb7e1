//! Admin loan product management.
//!
//! Every write drops the cached public catalog.

use axum::extract::State;

use ubuntu_lend_core::LoanTypeId;

use crate::db::LoanTypeRepository;
use crate::error::{AppError, AppJson, AppPath, Result};
use crate::middleware::RequireAdmin;
use crate::models::loan_type::{LoanType, LoanTypeUpdate, NewLoanType, validate_bounds};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Name must be present after trimming.
fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Bounds after applying `update` to `current`.
fn check_merged_bounds(current: &LoanType, update: &LoanTypeUpdate) -> Result<()> {
    validate_bounds(
        update.min_amount.unwrap_or(current.min_amount),
        update.max_amount.unwrap_or(current.max_amount),
        update.min_term_months.unwrap_or(current.min_term_months),
        update.max_term_months.unwrap_or(current.max_term_months),
        update
            .base_interest_rate
            .unwrap_or(current.base_interest_rate),
    )
    .map_err(AppError::BadRequest)
}

/// All loan types, including inactive ones.
///
/// # Route
///
/// `GET /api/admin/loan-types`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<LoanType>>> {
    let loan_types = LoanTypeRepository::new(state.pool()).list(true).await?;
    Ok(ApiResponse::ok(loan_types))
}

/// # Route
///
/// `POST /api/admin/loan-types`
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppJson(mut request): AppJson<NewLoanType>,
) -> Result<ApiResponse<LoanType>> {
    request.name = clean_name(&request.name)?;
    validate_bounds(
        request.min_amount,
        request.max_amount,
        request.min_term_months,
        request.max_term_months,
        request.base_interest_rate,
    )
    .map_err(AppError::BadRequest)?;

    let loan_type = LoanTypeRepository::new(state.pool()).create(&request).await?;
    state.catalog().invalidate();
    tracing::info!(admin_id = %admin.id, loan_type_id = %loan_type.id, "Loan type created");
    Ok(ApiResponse::created(loan_type))
}

/// # Route
///
/// `PATCH /api/admin/loan-types/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    AppPath(id): AppPath<i32>,
    AppJson(mut request): AppJson<LoanTypeUpdate>,
) -> Result<ApiResponse<LoanType>> {
    let id = LoanTypeId::new(id);
    let repo = LoanTypeRepository::new(state.pool());
    let current = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Loan type not found".to_string()))?;

    if let Some(name) = request.name.as_deref() {
        request.name = Some(clean_name(name)?);
    }
    check_merged_bounds(&current, &request)?;

    let loan_type = repo.update(id, &request).await?;
    state.catalog().invalidate();
    tracing::info!(admin_id = %admin.id, loan_type_id = %loan_type.id, "Loan type updated");
    Ok(ApiResponse::ok(loan_type))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn business_loan() -> LoanType {
        LoanType {
            id: LoanTypeId::new(2),
            name: "Business".to_string(),
            description: String::new(),
            min_amount: Decimal::from(5_000),
            max_amount: Decimal::from(200_000),
            min_term_months: 6,
            max_term_months: 36,
            base_interest_rate: Decimal::from(18),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_partial_update_is_checked_against_current_values() {
        let current = business_loan();
        let lower_max = LoanTypeUpdate {
            max_amount: Some(Decimal::from(1_000)),
            ..LoanTypeUpdate::default()
        };
        assert!(check_merged_bounds(&current, &lower_max).is_err());

        let longer = LoanTypeUpdate {
            max_term_months: Some(48),
            ..LoanTypeUpdate::default()
        };
        assert!(check_merged_bounds(&current, &longer).is_ok());
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  Emergency ").ok().as_deref(), Some("Emergency"));
        assert!(clean_name("   ").is_err());
    }
}
