//! Dashboard aggregate types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use ubuntu_lend_core::{ApplicationStatus, LoanTypeId};

/// Headline numbers for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub metric_date: NaiveDate,
    pub total_users: i64,
    /// Accounts created on `metric_date`.
    pub new_users: i64,
    pub total_applications: i64,
    pub pending_applications: i64,
    pub approved_applications: i64,
    pub rejected_applications: i64,
    /// Applications currently disbursed or defaulted.
    pub active_loans: i64,
    pub total_disbursed: Decimal,
    pub total_repaid: Decimal,
    pub outstanding_balance: Decimal,
    /// Percentage of reviewed applications that were not rejected.
    pub approval_rate: Decimal,
    /// Percentage of disbursed loans that defaulted.
    pub default_rate: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Per-product lending totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LoanTypePerformance {
    pub loan_type_id: LoanTypeId,
    pub loan_type_name: String,
    pub application_count: i64,
    pub approved_count: i64,
    pub total_requested: Decimal,
    pub total_disbursed: Decimal,
    pub average_amount: Decimal,
}

/// Application count and value per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatusDistribution {
    pub status: ApplicationStatus,
    pub count: i64,
    pub total_amount: Decimal,
}

/// Everything the admin dashboard renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub metrics: DashboardMetrics,
    pub loan_types: Vec<LoanTypePerformance>,
    pub status_distribution: Vec<LoanStatusDistribution>,
}
