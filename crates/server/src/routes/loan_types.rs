//! Public loan product catalog.

use axum::extract::State;
use rust_decimal::Decimal;
use serde::Deserialize;

use ubuntu_lend_core::{LoanTypeId, RepaymentQuote, quote as repayment_quote};

use crate::error::{AppError, AppPath, AppQuery, Result};
use crate::models::loan_type::LoanType;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub amount: Decimal,
    pub term_months: i32,
}

/// Active loan types.
///
/// # Route
///
/// `GET /api/loan-types`
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<LoanType>>> {
    let loan_types = state.catalog().active(state.pool()).await?;
    Ok(ApiResponse::ok(loan_types.as_ref().clone()))
}

/// Repayment quote for an amount and term on one loan type.
///
/// # Route
///
/// `GET /api/loan-types/{id}/quote?amount=&termMonths=`
pub async fn quote(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppQuery(query): AppQuery<QuoteQuery>,
) -> Result<ApiResponse<RepaymentQuote>> {
    let id = LoanTypeId::new(id);
    let catalog = state.catalog().active(state.pool()).await?;
    let loan_type = catalog
        .iter()
        .find(|lt| lt.id == id)
        .ok_or_else(|| AppError::NotFound("Loan type not found".to_string()))?;

    loan_type
        .check_bounds(query.amount, query.term_months)
        .map_err(AppError::BadRequest)?;

    Ok(ApiResponse::ok(repayment_quote(
        query.amount,
        loan_type.base_interest_rate,
        query.term_months,
    )?))
}
