//! Ledger entries recorded against disbursed applications.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ubuntu_lend_core::{ApplicationId, TransactionId, TransactionKind, UserId};

use super::SortOrder;

/// An append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Outstanding balance on the application after this entry.
    pub balance_after: Decimal,
    pub reference: String,
    pub note: Option<String>,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A transaction joined with the customer it belongs to, for list views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub customer_name: String,
    pub customer_email: String,
}

/// Admin request to record a repayment or fee.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordTransaction {
    pub application_id: ApplicationId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub note: Option<String>,
}

/// Sortable columns of the transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionSort {
    #[default]
    CreatedAt,
    Amount,
}

impl std::str::FromStr for TransactionSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "amount" => Ok(Self::Amount),
            _ => Err(format!("cannot sort transactions by {s}")),
        }
    }
}

/// Filters for transaction lists.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Case-insensitive match on reference, customer name or email.
    pub search: Option<String>,
    pub kind: Option<TransactionKind>,
    pub application_id: Option<ApplicationId>,
    pub user_id: Option<UserId>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: TransactionSort,
    pub sort_order: SortOrder,
}
