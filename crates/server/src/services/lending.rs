//! Loan application rules.
//!
//! Validation here is pure so it can be tested without a database; the
//! service methods wire it to the repositories.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use ubuntu_lend_core::{
    ApplicationId, ApplicationStatus, LoanMathError, LoanTypeId, TransactionKind, UserId,
    next_due_date, quote,
};

use crate::db::applications::{Disbursement, StatusChange};
use crate::db::transactions::{LedgerEntry, Recorded};
use crate::db::{
    ApplicationRepository, LoanTypeRepository, RepositoryError, TransactionRepository,
    UserRepository,
};
use crate::models::application::{Application, NewApplication, StatusUpdate};
use crate::models::loan_type::LoanType;
use crate::models::transaction::RecordTransaction;
use crate::services::notify::Notifier;

const MAX_TEXT_LENGTH: usize = 500;

#[derive(Debug, Error)]
pub enum LendingError {
    #[error("{0}")]
    Invalid(String),

    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    LoanMath(#[from] LoanMathError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Customer request to apply for a loan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplication {
    pub loan_type_id: LoanTypeId,
    pub amount: Decimal,
    pub term_months: i32,
    pub purpose: String,
    pub employment_status: String,
    pub employer_name: Option<String>,
    pub monthly_income: Decimal,
    pub bank_name: String,
    pub bank_account_number: String,
}

fn required(value: &str, field: &str) -> Result<String, LendingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LendingError::Invalid(format!("{field} is required")));
    }
    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(LendingError::Invalid(format!(
            "{field} must be at most {MAX_TEXT_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}

/// Money columns hold cents; finer amounts are refused rather than rounded.
fn ensure_cents(amount: Decimal, field: &str) -> Result<(), LendingError> {
    if amount.normalize().scale() > 2 {
        return Err(LendingError::Invalid(format!(
            "{field} cannot have more than 2 decimal places"
        )));
    }
    Ok(())
}

/// Check a submission against its loan type and build the row to insert.
///
/// # Errors
///
/// Returns `LendingError::Invalid` naming the first failing field.
pub fn validate_submission(
    user_id: UserId,
    request: &SubmitApplication,
    loan_type: &LoanType,
) -> Result<NewApplication, LendingError> {
    if !loan_type.is_active {
        return Err(LendingError::Invalid(format!(
            "{} is not accepting applications",
            loan_type.name
        )));
    }
    loan_type
        .check_bounds(request.amount, request.term_months)
        .map_err(LendingError::Invalid)?;
    ensure_cents(request.amount, "amount")?;
    if request.monthly_income < Decimal::ZERO {
        return Err(LendingError::Invalid(
            "monthlyIncome cannot be negative".to_string(),
        ));
    }
    ensure_cents(request.monthly_income, "monthlyIncome")?;
    let account = required(&request.bank_account_number, "bankAccountNumber")?;
    if !account.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-') {
        return Err(LendingError::Invalid(
            "bankAccountNumber may only contain letters, digits, spaces and dashes".to_string(),
        ));
    }

    Ok(NewApplication {
        user_id,
        loan_type_id: loan_type.id,
        amount: request.amount,
        term_months: request.term_months,
        interest_rate: loan_type.base_interest_rate,
        purpose: required(&request.purpose, "purpose")?,
        employment_status: required(&request.employment_status, "employmentStatus")?,
        employer_name: request
            .employer_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        monthly_income: request.monthly_income,
        bank_name: required(&request.bank_name, "bankName")?,
        bank_account_number: account,
    })
}

/// Check an admin status update against the transition whitelist and the
/// fields each target status requires.
///
/// # Errors
///
/// Returns `LendingError::InvalidTransition` for a disallowed move, or
/// `LendingError::Invalid` for a missing or bad auxiliary field.
pub fn validate_status_change(
    application: &Application,
    update: &StatusUpdate,
    reviewer: UserId,
) -> Result<StatusChange, LendingError> {
    let from = application.status;
    let to = update.status;

    let rejection_reason = match to {
        ApplicationStatus::Rejected => {
            let reason = update
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    LendingError::Invalid("rejectionReason is required when rejecting".to_string())
                })?;
            Some(reason.to_string())
        }
        _ => None,
    };

    if !from.can_transition_to(to) {
        return Err(LendingError::InvalidTransition { from, to });
    }

    let disbursement = match to {
        ApplicationStatus::Disbursed => {
            let amount = update.disbursed_amount.ok_or_else(|| {
                LendingError::Invalid("disbursedAmount is required when disbursing".to_string())
            })?;
            if amount <= Decimal::ZERO || amount > application.amount {
                return Err(LendingError::Invalid(format!(
                    "disbursedAmount must be greater than 0 and at most {}",
                    application.amount
                )));
            }
            ensure_cents(amount, "disbursedAmount")?;
            let terms = quote(amount, application.interest_rate, application.term_months)?;
            Some(Disbursement {
                amount,
                total_repayable: terms.total_repayable,
            })
        }
        _ => None,
    };

    Ok(StatusChange {
        from,
        to,
        rejection_reason,
        disbursement,
        reviewed_by: reviewer,
    })
}

/// Check an admin ledger entry before it is written.
///
/// # Errors
///
/// Returns `LendingError::Invalid` for disbursements (which only come from a
/// status change), non-positive amounts and fractions of a cent.
pub fn validate_entry(request: &RecordTransaction) -> Result<(), LendingError> {
    if request.kind == TransactionKind::Disbursement {
        return Err(LendingError::Invalid(
            "disbursements are recorded by moving the application to disbursed".to_string(),
        ));
    }
    if request.amount <= Decimal::ZERO {
        return Err(LendingError::Invalid(
            "amount must be greater than 0".to_string(),
        ));
    }
    ensure_cents(request.amount, "amount")
}

/// Summary of a customer's current loan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanOverview {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub principal: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i32,
    pub monthly_payment: Decimal,
    pub outstanding_balance: Decimal,
    pub payments_made: i64,
    /// `None` until the loan is disbursed, and once it is fully repaid.
    pub next_due_date: Option<NaiveDate>,
    pub next_payment_amount: Option<Decimal>,
}

/// Work out a loan's next payment from its terms and ledger.
///
/// # Errors
///
/// Returns `LendingError::LoanMath` if the stored terms cannot be amortized.
pub fn overview(
    application: &Application,
    outstanding_balance: Decimal,
    payments_made: i64,
) -> Result<LoanOverview, LendingError> {
    let principal = application.disbursed_amount.unwrap_or(application.amount);
    let terms = quote(principal, application.interest_rate, application.term_months)?;

    let (next_due_date, next_payment_amount) = match application.disbursed_at {
        Some(disbursed_at)
            if application.status.is_repayable() && outstanding_balance > Decimal::ZERO =>
        {
            let made = u32::try_from(payments_made).unwrap_or(u32::MAX);
            (
                next_due_date(disbursed_at.date_naive(), made),
                Some(terms.monthly_payment.min(outstanding_balance)),
            )
        }
        _ => (None, None),
    };

    Ok(LoanOverview {
        application_id: application.id,
        status: application.status,
        principal,
        interest_rate: application.interest_rate,
        term_months: application.term_months,
        monthly_payment: terms.monthly_payment,
        outstanding_balance,
        payments_made,
        next_due_date,
        next_payment_amount,
    })
}

/// Application lifecycle service.
pub struct LendingService<'a> {
    applications: ApplicationRepository<'a>,
    loan_types: LoanTypeRepository<'a>,
    transactions: TransactionRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> LendingService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            applications: ApplicationRepository::new(pool),
            loan_types: LoanTypeRepository::new(pool),
            transactions: TransactionRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Submit a new application for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Invalid` if the loan type is unknown or the
    /// request breaks its bounds.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn submit(
        &self,
        user_id: UserId,
        request: &SubmitApplication,
    ) -> Result<Application, LendingError> {
        let loan_type = self
            .loan_types
            .get(request.loan_type_id)
            .await?
            .ok_or_else(|| LendingError::Invalid("loanTypeId does not exist".to_string()))?;

        let new = validate_submission(user_id, request, &loan_type)?;
        let application = self.applications.create(&new).await?;

        tracing::info!(application_id = %application.id, amount = %application.amount, "Application submitted");
        Ok(application)
    }

    /// Move an application to a new status and notify the applicant.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown application and the
    /// errors of [`validate_status_change`].
    #[instrument(skip(self, update, notifier), fields(to = %update.status))]
    pub async fn review(
        &self,
        id: ApplicationId,
        update: &StatusUpdate,
        reviewer: UserId,
        notifier: &Notifier,
    ) -> Result<Application, LendingError> {
        let application = self
            .applications
            .get(id)
            .await?
            .ok_or(LendingError::NotFound("application"))?;

        let change = validate_status_change(&application, update, reviewer)?;
        let updated = self.applications.apply_status_change(id, &change).await?;

        tracing::info!(from = %change.from, to = %change.to, "Application status changed");

        if let Some(applicant) = self.users.get_by_id(updated.user_id).await? {
            notifier
                .application_status_changed(
                    &applicant.email,
                    &applicant.first_name,
                    updated.id,
                    updated.status,
                    updated.rejection_reason.as_deref(),
                )
                .await;
        }

        Ok(updated)
    }

    /// Record a repayment or fee against a disbursed loan.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Invalid` for a bad entry or a loan that is not
    /// repayable, `LendingError::NotFound` for an unknown application.
    #[instrument(skip(self, request), fields(application_id = %request.application_id))]
    pub async fn record_transaction(
        &self,
        request: &RecordTransaction,
        recorded_by: UserId,
    ) -> Result<Recorded, LendingError> {
        validate_entry(request)?;

        let application = self
            .applications
            .get(request.application_id)
            .await?
            .ok_or(LendingError::NotFound("application"))?;
        if !application.status.is_repayable() {
            return Err(LendingError::Invalid(format!(
                "cannot record a {} against a {} application",
                request.kind, application.status
            )));
        }

        let recorded = self
            .transactions
            .record(&LedgerEntry {
                application_id: request.application_id,
                kind: request.kind,
                amount: request.amount,
                note: request
                    .note
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from),
                recorded_by,
            })
            .await?;

        tracing::info!(
            reference = %recorded.transaction.reference,
            balance_after = %recorded.transaction.balance_after,
            completed = recorded.completed,
            "Transaction recorded"
        );
        Ok(recorded)
    }

    /// The customer's current loan with its repayment position.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` if the user has no open application.
    pub async fn current_loan(&self, user_id: UserId) -> Result<LoanOverview, LendingError> {
        let application = self
            .applications
            .current_for_user(user_id)
            .await?
            .ok_or(LendingError::NotFound("active loan"))?;
        let balance = self.transactions.outstanding_balance(application.id).await?;
        let payments = self.transactions.count_repayments(application.id).await?;
        overview(&application, balance, payments)
    }
}
