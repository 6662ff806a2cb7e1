//! Loan application domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ubuntu_lend_core::{ApplicationId, ApplicationStatus, LoanTypeId, UserId};

use super::SortOrder;

/// A customer's loan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub loan_type_id: LoanTypeId,
    pub amount: Decimal,
    pub term_months: i32,
    /// Annual rate fixed at submission time.
    pub interest_rate: Decimal,
    pub purpose: String,
    pub employment_status: String,
    pub employer_name: Option<String>,
    pub monthly_income: Decimal,
    pub bank_name: String,
    pub bank_account_number: String,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub disbursed_amount: Option<Decimal>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An application joined with its applicant and loan type, for list views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    #[serde(flatten)]
    pub application: Application,
    pub applicant_name: String,
    pub applicant_email: String,
    pub applicant_phone: Option<String>,
    pub loan_type_name: String,
}

/// Validated input for a new application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: UserId,
    pub loan_type_id: LoanTypeId,
    pub amount: Decimal,
    pub term_months: i32,
    pub interest_rate: Decimal,
    pub purpose: String,
    pub employment_status: String,
    pub employer_name: Option<String>,
    pub monthly_income: Decimal,
    pub bank_name: String,
    pub bank_account_number: String,
}

/// Admin request to move an application to a new status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    /// Required when rejecting.
    pub rejection_reason: Option<String>,
    /// Required when disbursing; at most the requested amount.
    pub disbursed_amount: Option<Decimal>,
}

/// Sortable columns of the application list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationSort {
    #[default]
    CreatedAt,
    Amount,
    Status,
    TermMonths,
}

impl std::str::FromStr for ApplicationSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "amount" => Ok(Self::Amount),
            "status" => Ok(Self::Status),
            "termMonths" => Ok(Self::TermMonths),
            _ => Err(format!("cannot sort applications by {s}")),
        }
    }
}

/// Filters for the admin application list (and a customer's own list).
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    /// Case-insensitive match on applicant name, email or phone.
    pub search: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub loan_type_id: Option<LoanTypeId>,
    pub user_id: Option<UserId>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: ApplicationSort,
    pub sort_order: SortOrder,
}
