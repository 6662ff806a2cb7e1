//! The signed-in user's current loan.
//!
//! "Current" is the most recent disbursed or defaulted application, falling
//! back to approved and then pending ones. Users with none get 404.

use axum::extract::State;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use ubuntu_lend_core::{ApplicationId, ApplicationStatus};

use super::params::PageParams;
use crate::db::TransactionRepository;
use crate::error::{AppQuery, Result};
use crate::middleware::RequireUser;
use crate::models::transaction::{TransactionFilter, TransactionSummary};
use crate::response::ApiResponse;
use crate::services::{LendingService, LoanOverview};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRate {
    pub application_id: ApplicationId,
    pub interest_rate: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerm {
    pub application_id: ApplicationId,
    pub term_months: i32,
    pub payments_made: i64,
    pub payments_remaining: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPayment {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub due_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub monthly_payment: Decimal,
    pub outstanding_balance: Decimal,
}

impl From<&LoanOverview> for LoanTerm {
    fn from(loan: &LoanOverview) -> Self {
        Self {
            application_id: loan.application_id,
            term_months: loan.term_months,
            payments_made: loan.payments_made,
            payments_remaining: (i64::from(loan.term_months) - loan.payments_made).max(0),
        }
    }
}

impl From<&LoanOverview> for NextPayment {
    fn from(loan: &LoanOverview) -> Self {
        Self {
            application_id: loan.application_id,
            status: loan.status,
            due_date: loan.next_due_date,
            amount: loan.next_payment_amount,
            monthly_payment: loan.monthly_payment,
            outstanding_balance: loan.outstanding_balance,
        }
    }
}

/// # Route
///
/// `GET /api/loans/interest-rate`
pub async fn interest_rate(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<InterestRate>> {
    let loan = LendingService::new(state.pool()).current_loan(user.id).await?;
    Ok(ApiResponse::ok(InterestRate {
        application_id: loan.application_id,
        interest_rate: loan.interest_rate,
    }))
}

/// # Route
///
/// `GET /api/loans/term`
pub async fn term(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<LoanTerm>> {
    let loan = LendingService::new(state.pool()).current_loan(user.id).await?;
    Ok(ApiResponse::ok(LoanTerm::from(&loan)))
}

/// # Route
///
/// `GET /api/loans/next-payment`
pub async fn next_payment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<NextPayment>> {
    let loan = LendingService::new(state.pool()).current_loan(user.id).await?;
    Ok(ApiResponse::ok(NextPayment::from(&loan)))
}

/// The signed-in user's ledger entries across all their loans.
///
/// # Route
///
/// `GET /api/loans/transactions`
pub async fn transactions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    AppQuery(params): AppQuery<PageParams>,
) -> Result<ApiResponse<Vec<TransactionSummary>>> {
    let filter = TransactionFilter {
        user_id: Some(user.id),
        ..TransactionFilter::default()
    };
    let page = params.request();
    let entries = TransactionRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(ApiResponse::page(entries, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(payments_made: i64) -> LoanOverview {
        LoanOverview {
            application_id: ApplicationId::new(4),
            status: ApplicationStatus::Disbursed,
            principal: Decimal::from(12_000),
            interest_rate: Decimal::from(12),
            term_months: 12,
            monthly_payment: Decimal::new(106_619, 2),
            outstanding_balance: Decimal::new(1_066_190, 2),
            payments_made,
            next_due_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            next_payment_amount: Some(Decimal::new(106_619, 2)),
        }
    }

    #[test]
    fn test_payments_remaining_never_negative() {
        assert_eq!(LoanTerm::from(&loan(2)).payments_remaining, 10);
        assert_eq!(LoanTerm::from(&loan(14)).payments_remaining, 0);
    }

    #[test]
    fn test_next_payment_copies_schedule() {
        let next = NextPayment::from(&loan(2));
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(next.amount, Some(Decimal::new(106_619, 2)));
    }
}
