//! Application repository.
//!
//! Status changes run inside a database transaction together with the ledger
//! entry they produce, and only apply if the row is still in the status the
//! caller validated against.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use ubuntu_lend_core::{ApplicationId, ApplicationStatus, LoanTypeId, PageRequest, TransactionKind, UserId};

use super::RepositoryError;
use super::query::{Conditions, Page, push_order_and_page};
use super::transactions::generate_reference;
use crate::models::application::{
    Application, ApplicationFilter, ApplicationSort, ApplicationSummary, NewApplication,
};

const APPLICATION_COLUMNS: &str = "a.id, a.user_id, a.loan_type_id, a.amount, a.term_months, \
     a.interest_rate, a.purpose, a.employment_status, a.employer_name, a.monthly_income, \
     a.bank_name, a.bank_account_number, a.status, a.rejection_reason, a.disbursed_amount, \
     a.disbursed_at, a.reviewed_by, a.reviewed_at, a.created_at, a.updated_at";

const SUMMARY_JOINS: &str = " FROM applications a \
     JOIN users u ON u.id = a.user_id \
     JOIN loan_types lt ON lt.id = a.loan_type_id";

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: ApplicationId,
    user_id: UserId,
    loan_type_id: LoanTypeId,
    amount: Decimal,
    term_months: i32,
    interest_rate: Decimal,
    purpose: String,
    employment_status: String,
    employer_name: Option<String>,
    monthly_income: Decimal,
    bank_name: String,
    bank_account_number: String,
    status: ApplicationStatus,
    rejection_reason: Option<String>,
    disbursed_amount: Option<Decimal>,
    disbursed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            loan_type_id: row.loan_type_id,
            amount: row.amount,
            term_months: row.term_months,
            interest_rate: row.interest_rate,
            purpose: row.purpose,
            employment_status: row.employment_status,
            employer_name: row.employer_name,
            monthly_income: row.monthly_income,
            bank_name: row.bank_name,
            bank_account_number: row.bank_account_number,
            status: row.status,
            rejection_reason: row.rejection_reason,
            disbursed_amount: row.disbursed_amount,
            disbursed_at: row.disbursed_at,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    application: ApplicationRow,
    applicant_name: String,
    applicant_email: String,
    applicant_phone: Option<String>,
    loan_type_name: String,
}

impl From<SummaryRow> for ApplicationSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            application: row.application.into(),
            applicant_name: row.applicant_name,
            applicant_email: row.applicant_email,
            applicant_phone: row.applicant_phone,
            loan_type_name: row.loan_type_name,
        }
    }
}

/// A validated status change, ready to be written.
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status the caller validated the transition from.
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub rejection_reason: Option<String>,
    /// Amount paid out and the balance it opens, set when disbursing.
    pub disbursement: Option<Disbursement>,
    pub reviewed_by: UserId,
}

#[derive(Debug, Clone, Copy)]
pub struct Disbursement {
    pub amount: Decimal,
    pub total_repayable: Decimal,
}

/// Repository for loan applications.
pub struct ApplicationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ApplicationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, new), fields(user_id = %new.user_id, loan_type_id = %new.loan_type_id))]
    pub async fn create(&self, new: &NewApplication) -> Result<Application, RepositoryError> {
        let sql = format!(
            "INSERT INTO applications AS a (user_id, loan_type_id, amount, term_months, \
                 interest_rate, purpose, employment_status, employer_name, monthly_income, \
                 bank_name, bank_account_number, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending') \
             RETURNING {APPLICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(new.user_id)
            .bind(new.loan_type_id)
            .bind(new.amount)
            .bind(new.term_months)
            .bind(new.interest_rate)
            .bind(&new.purpose)
            .bind(&new.employment_status)
            .bind(new.employer_name.as_deref())
            .bind(new.monthly_income)
            .bind(&new.bank_name)
            .bind(&new.bank_account_number)
            .fetch_one(self.pool)
            .await?;
        Ok(row.into())
    }

    /// Get an application by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications a WHERE a.id = $1");
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Application::from))
    }

    /// Get an application only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: ApplicationId,
        user_id: UserId,
    ) -> Result<Option<Application>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications a WHERE a.id = $1 AND a.user_id = $2"
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Application::from))
    }

    /// Get an application with applicant and loan type details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_summary(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError> {
        let mut qb = summary_select();
        qb.push(" WHERE a.id = ").push_bind(id);
        let row = qb
            .build_query_as::<SummaryRow>()
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(ApplicationSummary::from))
    }

    /// All applications of one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Application>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications a \
             WHERE a.user_id = $1 ORDER BY a.created_at DESC, a.id DESC"
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Application::from).collect())
    }

    /// The user's current loan: the newest disbursed or defaulted one, else
    /// the newest approved, else the newest pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Application>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications a \
             WHERE a.user_id = $1 \
               AND a.status IN ('disbursed', 'defaulted', 'approved', 'pending') \
             ORDER BY CASE a.status \
                 WHEN 'disbursed' THEN 0 WHEN 'defaulted' THEN 0 \
                 WHEN 'approved' THEN 1 ELSE 2 END, \
               a.created_at DESC, a.id DESC \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Application::from))
    }

    /// List applications with applicant details, filtered and paginated in SQL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<ApplicationSummary>, RepositoryError> {
        let total_count: i64 = build_count(filter)
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;
        let rows: Vec<SummaryRow> = build_list(filter, page)
            .build_query_as()
            .fetch_all(self.pool)
            .await?;
        Ok(Page {
            items: rows.into_iter().map(ApplicationSummary::from).collect(),
            total_count,
        })
    }

    /// Apply a status change, writing the disbursement ledger entry in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the application is no longer in
    /// `change.from`, or `RepositoryError::NotFound` if it does not exist.
    #[instrument(skip(self, change), fields(application_id = %id, to = %change.to))]
    pub async fn apply_status_change(
        &self,
        id: ApplicationId,
        change: &StatusChange,
    ) -> Result<Application, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE applications AS a SET status = $3, \
                 rejection_reason = COALESCE($4, a.rejection_reason), \
                 disbursed_amount = COALESCE($5, a.disbursed_amount), \
                 disbursed_at = CASE WHEN $5::numeric IS NULL THEN a.disbursed_at ELSE NOW() END, \
                 reviewed_by = $6, reviewed_at = NOW(), updated_at = NOW() \
             WHERE a.id = $1 AND a.status = $2 \
             RETURNING {APPLICATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .bind(change.from)
            .bind(change.to)
            .bind(change.rejection_reason.as_deref())
            .bind(change.disbursement.map(|d| d.amount))
            .bind(change.reviewed_by)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = updated else {
            let exists: Option<ApplicationStatus> =
                sqlx::query_scalar("SELECT status FROM applications WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(current) => RepositoryError::Conflict(format!(
                    "application is now {current}, not {}",
                    change.from
                )),
                None => RepositoryError::NotFound,
            });
        };

        if let Some(disbursement) = change.disbursement {
            sqlx::query(
                "INSERT INTO transactions (application_id, user_id, kind, amount, \
                     balance_after, reference, recorded_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(row.id)
            .bind(row.user_id)
            .bind(TransactionKind::Disbursement)
            .bind(disbursement.amount)
            .bind(disbursement.total_repayable)
            .bind(generate_reference(TransactionKind::Disbursement))
            .bind(change.reviewed_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }
}

fn summary_select() -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(APPLICATION_COLUMNS)
        .push(", (u.first_name || ' ' || u.last_name) AS applicant_name")
        .push(", u.email AS applicant_email, u.phone AS applicant_phone")
        .push(", lt.name AS loan_type_name")
        .push(SUMMARY_JOINS);
    qb
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ApplicationFilter) {
    let mut conds = Conditions::new(qb);
    conds.search(
        &[
            "u.first_name",
            "u.last_name",
            "(u.first_name || ' ' || u.last_name)",
            "u.email",
            "u.phone",
        ],
        filter.search.as_deref(),
    );
    if let Some(status) = filter.status {
        conds.and().push("a.status = ").push_bind(status);
    }
    if let Some(loan_type_id) = filter.loan_type_id {
        conds.and().push("a.loan_type_id = ").push_bind(loan_type_id);
    }
    if let Some(user_id) = filter.user_id {
        conds.and().push("a.user_id = ").push_bind(user_id);
    }
    conds.min_decimal("a.amount", filter.min_amount);
    conds.max_decimal("a.amount", filter.max_amount);
    conds.date_range("a.created_at", filter.date_from, filter.date_to);
}

const fn sort_expr(sort: ApplicationSort) -> &'static str {
    match sort {
        ApplicationSort::CreatedAt => "a.created_at",
        ApplicationSort::Amount => "a.amount",
        ApplicationSort::Status => "a.status",
        ApplicationSort::TermMonths => "a.term_months",
    }
}

fn build_count(filter: &ApplicationFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*)");
    qb.push(SUMMARY_JOINS);
    push_filter(&mut qb, filter);
    qb
}

fn build_list(filter: &ApplicationFilter, page: PageRequest) -> QueryBuilder<'static, Postgres> {
    let mut qb = summary_select();
    push_filter(&mut qb, filter);
    push_order_and_page(
        &mut qb,
        sort_expr(filter.sort_by),
        filter.sort_order.as_sql(),
        "a.id",
        page,
    );
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;

    #[test]
    fn test_list_joins_applicant_and_loan_type() {
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Pending),
            loan_type_id: Some(LoanTypeId::new(3)),
            ..ApplicationFilter::default()
        };
        let sql = build_list(&filter, PageRequest::default()).sql().to_string();
        assert!(sql.contains("JOIN users u ON u.id = a.user_id"));
        assert!(sql.contains("JOIN loan_types lt ON lt.id = a.loan_type_id"));
        assert!(sql.contains("WHERE a.status = $1 AND a.loan_type_id = $2"));
        assert!(sql.ends_with("ORDER BY a.created_at DESC NULLS LAST, a.id DESC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn test_count_has_no_paging() {
        let filter = ApplicationFilter {
            min_amount: Some(Decimal::from(500)),
            sort_by: ApplicationSort::Amount,
            sort_order: SortOrder::Asc,
            ..ApplicationFilter::default()
        };
        let sql = build_count(&filter).sql().to_string();
        assert!(sql.starts_with("SELECT COUNT(*) FROM applications a"));
        assert!(sql.ends_with("WHERE a.amount >= $1"));
    }
}
