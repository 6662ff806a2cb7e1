//! Loan type repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use ubuntu_lend_core::LoanTypeId;

use super::{RepositoryError, map_unique_violation};
use crate::models::loan_type::{LoanType, LoanTypeUpdate, NewLoanType};

const LOAN_TYPE_COLUMNS: &str = "id, name, description, min_amount, max_amount, \
     min_term_months, max_term_months, base_interest_rate, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct LoanTypeRow {
    id: LoanTypeId,
    name: String,
    description: String,
    min_amount: Decimal,
    max_amount: Decimal,
    min_term_months: i32,
    max_term_months: i32,
    base_interest_rate: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LoanTypeRow> for LoanType {
    fn from(row: LoanTypeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            min_term_months: row.min_term_months,
            max_term_months: row.max_term_months,
            base_interest_rate: row.base_interest_rate,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn name_conflict(_: Option<&str>) -> String {
    "a loan type with this name already exists".to_string()
}

/// Repository for the loan product catalog.
pub struct LoanTypeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoanTypeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List loan types, optionally including inactive ones, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<LoanType>, RepositoryError> {
        let sql = format!(
            "SELECT {LOAN_TYPE_COLUMNS} FROM loan_types \
             WHERE is_active OR $1 ORDER BY name ASC"
        );
        let rows = sqlx::query_as::<_, LoanTypeRow>(&sql)
            .bind(include_inactive)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(LoanType::from).collect())
    }

    /// Get a loan type by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LoanTypeId) -> Result<Option<LoanType>, RepositoryError> {
        let sql = format!("SELECT {LOAN_TYPE_COLUMNS} FROM loan_types WHERE id = $1");
        let row = sqlx::query_as::<_, LoanTypeRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(LoanType::from))
    }

    /// Create a loan type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, new: &NewLoanType) -> Result<LoanType, RepositoryError> {
        let sql = format!(
            "INSERT INTO loan_types (name, description, min_amount, max_amount, \
                 min_term_months, max_term_months, base_interest_rate, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {LOAN_TYPE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, LoanTypeRow>(&sql)
            .bind(new.name.trim())
            .bind(&new.description)
            .bind(new.min_amount)
            .bind(new.max_amount)
            .bind(new.min_term_months)
            .bind(new.max_term_months)
            .bind(new.base_interest_rate)
            .bind(new.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, name_conflict))?;
        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the loan type does not exist,
    /// or `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: LoanTypeId,
        update: &LoanTypeUpdate,
    ) -> Result<LoanType, RepositoryError> {
        let row = build_update(id, update)
            .build_query_as::<LoanTypeRow>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, name_conflict))?
            .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }
}

fn build_update(id: LoanTypeId, update: &LoanTypeUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE loan_types SET ");
    let mut set = qb.separated(", ");
    if let Some(name) = &update.name {
        set.push("name = ").push_bind_unseparated(name.trim().to_string());
    }
    if let Some(description) = &update.description {
        set.push("description = ").push_bind_unseparated(description.clone());
    }
    if let Some(v) = update.min_amount {
        set.push("min_amount = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.max_amount {
        set.push("max_amount = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.min_term_months {
        set.push("min_term_months = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.max_term_months {
        set.push("max_term_months = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.base_interest_rate {
        set.push("base_interest_rate = ").push_bind_unseparated(v);
    }
    if let Some(v) = update.is_active {
        set.push("is_active = ").push_bind_unseparated(v);
    }
    set.push("updated_at = NOW()");
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(LOAN_TYPE_COLUMNS);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sets_only_given_fields() {
        let update = LoanTypeUpdate {
            max_amount: Some(Decimal::from(80_000)),
            is_active: Some(false),
            ..LoanTypeUpdate::default()
        };
        let qb = build_update(LoanTypeId::new(2), &update);
        assert!(qb.sql().starts_with(
            "UPDATE loan_types SET max_amount = $1, is_active = $2, updated_at = NOW() WHERE id = $3"
        ));
    }
}
