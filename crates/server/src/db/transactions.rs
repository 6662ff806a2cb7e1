//! Ledger repository.
//!
//! Transactions are append-only. Each entry stores the application's
//! outstanding balance after it was applied, so the latest row per
//! application is the current balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use ubuntu_lend_core::{
    ApplicationId, ApplicationStatus, PageRequest, TransactionId, TransactionKind, UserId,
};

use super::RepositoryError;
use super::query::{Conditions, Page, push_order_and_page};
use crate::models::transaction::{
    Transaction, TransactionFilter, TransactionSort, TransactionSummary,
};

const TRANSACTION_COLUMNS: &str = "t.id, t.application_id, t.user_id, t.kind, t.amount, \
     t.balance_after, t.reference, t.note, t.recorded_by, t.created_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: TransactionId,
    application_id: ApplicationId,
    user_id: UserId,
    kind: TransactionKind,
    amount: Decimal,
    balance_after: Decimal,
    reference: String,
    note: Option<String>,
    recorded_by: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            application_id: row.application_id,
            user_id: row.user_id,
            kind: row.kind,
            amount: row.amount,
            balance_after: row.balance_after,
            reference: row.reference,
            note: row.note,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    customer_name: String,
    customer_email: String,
}

/// Generate a unique, human-readable ledger reference.
#[must_use]
pub fn generate_reference(kind: TransactionKind) -> String {
    let prefix = match kind {
        TransactionKind::Disbursement => "DSB",
        TransactionKind::Repayment => "RPY",
        TransactionKind::Fee => "FEE",
    };
    format!("{prefix}-{}", Uuid::new_v4().simple()).to_uppercase()
}

/// Balance after applying an entry of `kind` to `current`.
///
/// Repayments never take the balance below zero.
#[must_use]
pub fn next_balance(kind: TransactionKind, current: Decimal, amount: Decimal) -> Decimal {
    match kind {
        TransactionKind::Disbursement | TransactionKind::Fee => current + amount,
        TransactionKind::Repayment => (current - amount).max(Decimal::ZERO),
    }
}

/// A repayment or fee to append to an application's ledger.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub application_id: ApplicationId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub note: Option<String>,
    pub recorded_by: UserId,
}

/// Result of appending a ledger entry.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recorded {
    pub transaction: Transaction,
    /// The entry settled the loan and the application is now `completed`.
    pub completed: bool,
}

/// Repository for the transaction ledger.
pub struct TransactionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a repayment or fee, completing the application when a
    /// repayment clears the balance.
    ///
    /// The application row is locked for the duration so concurrent entries
    /// see each other's balances.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist,
    /// or `RepositoryError::Conflict` if it is not disbursed or defaulted.
    #[instrument(skip(self, entry), fields(application_id = %entry.application_id, kind = %entry.kind))]
    pub async fn record(&self, entry: &LedgerEntry) -> Result<Recorded, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(ApplicationStatus, UserId)> = sqlx::query_as(
            "SELECT status, user_id FROM applications WHERE id = $1 FOR UPDATE",
        )
        .bind(entry.application_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (status, user_id) = locked.ok_or(RepositoryError::NotFound)?;
        if !status.is_repayable() {
            return Err(RepositoryError::Conflict(format!(
                "cannot record a {} against a {status} application",
                entry.kind
            )));
        }

        let current: Decimal = sqlx::query_scalar(
            "SELECT balance_after FROM transactions WHERE application_id = $1 \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(entry.application_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(Decimal::ZERO);
        let balance_after = next_balance(entry.kind, current, entry.amount);

        let sql = format!(
            "INSERT INTO transactions AS t (application_id, user_id, kind, amount, \
                 balance_after, reference, note, recorded_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {TRANSACTION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(entry.application_id)
            .bind(user_id)
            .bind(entry.kind)
            .bind(entry.amount)
            .bind(balance_after)
            .bind(generate_reference(entry.kind))
            .bind(entry.note.as_deref())
            .bind(entry.recorded_by)
            .fetch_one(&mut *tx)
            .await?;

        let completed = entry.kind == TransactionKind::Repayment && balance_after.is_zero();
        if completed {
            sqlx::query(
                "UPDATE applications SET status = 'completed', updated_at = NOW() WHERE id = $1",
            )
            .bind(entry.application_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Recorded {
            transaction: row.into(),
            completed,
        })
    }

    /// Current outstanding balance of an application (zero before disbursement).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn outstanding_balance(
        &self,
        application_id: ApplicationId,
    ) -> Result<Decimal, RepositoryError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance_after FROM transactions WHERE application_id = $1 \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(application_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    /// Number of repayments recorded against an application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_repayments(
        &self,
        application_id: ApplicationId,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE application_id = $1 AND kind = 'repayment'",
        )
        .bind(application_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// List ledger entries with customer details, filtered and paginated in SQL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<TransactionSummary>, RepositoryError> {
        let total_count: i64 = build_count(filter)
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;
        let rows: Vec<SummaryRow> = build_list(filter, page)
            .build_query_as()
            .fetch_all(self.pool)
            .await?;
        let items = rows
            .into_iter()
            .map(|row| TransactionSummary {
                transaction: row.transaction.into(),
                customer_name: row.customer_name,
                customer_email: row.customer_email,
            })
            .collect();
        Ok(Page { items, total_count })
    }
}

fn push_from_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    qb.push(" FROM transactions t JOIN users u ON u.id = t.user_id");
    let mut conds = Conditions::new(qb);
    conds.search(
        &[
            "t.reference",
            "u.first_name",
            "u.last_name",
            "(u.first_name || ' ' || u.last_name)",
            "u.email",
        ],
        filter.search.as_deref(),
    );
    if let Some(kind) = filter.kind {
        conds.and().push("t.kind = ").push_bind(kind);
    }
    if let Some(application_id) = filter.application_id {
        conds.and().push("t.application_id = ").push_bind(application_id);
    }
    if let Some(user_id) = filter.user_id {
        conds.and().push("t.user_id = ").push_bind(user_id);
    }
    conds.min_decimal("t.amount", filter.min_amount);
    conds.max_decimal("t.amount", filter.max_amount);
    conds.date_range("t.created_at", filter.date_from, filter.date_to);
}

const fn sort_expr(sort: TransactionSort) -> &'static str {
    match sort {
        TransactionSort::CreatedAt => "t.created_at",
        TransactionSort::Amount => "t.amount",
    }
}

fn build_count(filter: &TransactionFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*)");
    push_from_where(&mut qb, filter);
    qb
}

fn build_list(filter: &TransactionFilter, page: PageRequest) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(TRANSACTION_COLUMNS)
        .push(", (u.first_name || ' ' || u.last_name) AS customer_name")
        .push(", u.email AS customer_email");
    push_from_where(&mut qb, filter);
    push_order_and_page(
        &mut qb,
        sort_expr(filter.sort_by),
        filter.sort_order.as_sql(),
        "t.id",
        page,
    );
    qb
}
