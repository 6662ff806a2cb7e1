//! User repository for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use ubuntu_lend_core::{AuthProvider, Email, PageRequest, PhoneNumber, UserId, UserStatus};

use super::query::{Conditions, Page, push_order_and_page};
use super::{RepositoryError, map_unique_violation};
use crate::models::user::{
    AdminUserUpdate, CustomerFilter, CustomerSort, CustomerSummary, NewUser, ProfileUpdate, User,
};

const USER_COLUMNS: &str = "u.id, u.first_name, u.last_name, u.email, u.phone, \
     u.email_verified, u.phone_verified, u.is_admin, u.status, u.date_of_birth, u.gender, \
     u.national_id, u.address, u.city, u.country, u.employment_status, u.employer_name, \
     u.monthly_income, u.auth_provider, u.avatar_url, u.login_count, u.last_login_at, \
     u.created_at, u.updated_at";

const LOAN_TOTALS_CTE: &str = "WITH loan_totals AS ( \
     SELECT user_id, COUNT(*) AS loan_count, COALESCE(SUM(amount), 0) AS total_borrowed \
     FROM applications GROUP BY user_id) ";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    email_verified: bool,
    phone_verified: bool,
    is_admin: bool,
    status: UserStatus,
    date_of_birth: Option<NaiveDate>,
    gender: Option<String>,
    national_id: Option<String>,
    address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    employment_status: Option<String>,
    employer_name: Option<String>,
    monthly_income: Option<Decimal>,
    auth_provider: AuthProvider,
    avatar_url: Option<String>,
    login_count: i32,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email for user {}: {e}", row.id))
        })?;
        let phone = row
            .phone
            .as_deref()
            .map(PhoneNumber::parse_international)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid phone for user {}: {e}", row.id))
            })?;

        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email,
            phone,
            email_verified: row.email_verified,
            phone_verified: row.phone_verified,
            is_admin: row.is_admin,
            status: row.status,
            date_of_birth: row.date_of_birth,
            gender: row.gender,
            national_id: row.national_id,
            address: row.address,
            city: row.city,
            country: row.country,
            employment_status: row.employment_status,
            employer_name: row.employer_name,
            monthly_income: row.monthly_income,
            auth_provider: row.auth_provider,
            avatar_url: row.avatar_url,
            login_count: row.login_count,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    #[sqlx(flatten)]
    user: UserRow,
    loan_count: i64,
    total_borrowed: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct PasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

fn conflict_field(constraint: Option<&str>) -> String {
    match constraint {
        Some(c) if c.contains("phone") => "phone".to_string(),
        _ => "email".to_string(),
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID, whatever their status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user by normalized email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user by full international phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.phone = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(phone.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = $1");
        let row = sqlx::query_as::<_, PasswordRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(password_hash) = row.password_hash else {
            return Ok(None);
        };
        Ok(Some((User::try_from(row.user)?, password_hash)))
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming `email` or `phone` if either
    /// is already registered.
    pub async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users AS u (first_name, last_name, email, phone, password_hash, \
                 email_verified, phone_verified, auth_provider, avatar_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(new.email.as_str())
            .bind(new.phone.as_ref().map(PhoneNumber::as_str))
            .bind(new.password_hash.as_deref())
            .bind(new.email_verified)
            .bind(new.phone_verified)
            .bind(new.auth_provider)
            .bind(new.avatar_url.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, conflict_field))?;
        User::try_from(row)
    }

    /// Record a successful sign-in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn record_login(&self, id: UserId) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users AS u SET login_count = login_count + 1, last_login_at = NOW(), \
                 updated_at = NOW() \
             WHERE u.id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(row)
    }

    /// Mark the user's phone number as verified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_phone_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET phone_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set the admin flag by email. Returns `false` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_admin_by_email(
        &self,
        email: &Email,
        is_admin: bool,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE email = $1")
                .bind(email.as_str())
                .bind(is_admin)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a profile update from the account owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        self.update(id, &AdminUserUpdate {
            profile: update.clone(),
            ..AdminUserUpdate::default()
        })
        .await
    }

    /// Apply an admin update. Unset fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist, or
    /// `RepositoryError::Conflict` if a new email or phone is taken.
    pub async fn update(&self, id: UserId, update: &AdminUserUpdate) -> Result<User, RepositoryError> {
        let mut qb = build_update(id, update);
        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, conflict_field))?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(row)
    }

    /// Soft-delete a user by setting their status to `deleted`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn soft_delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET status = 'deleted', updated_at = NOW() \
             WHERE id = $1 AND status <> 'deleted'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List customers with lending totals, filtered and paginated in SQL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<CustomerSummary>, RepositoryError> {
        let mut count_qb = build_customer_count(filter);
        let total_count: i64 = count_qb.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = build_customer_list(filter, page);
        let rows: Vec<CustomerRow> = qb.build_query_as().fetch_all(self.pool).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(CustomerSummary {
                    user: User::try_from(row.user)?,
                    loan_count: row.loan_count,
                    total_borrowed: row.total_borrowed,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Page { items, total_count })
    }
}

// =============================================================================
// Query Builders
// =============================================================================

fn push_set<'args, T>(
    qb: &mut QueryBuilder<'args, Postgres>,
    first: &mut bool,
    column: &str,
    value: Option<T>,
) where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres> + Send,
{
    if let Some(value) = value {
        if !*first {
            qb.push(", ");
        }
        *first = false;
        qb.push(column).push(" = ").push_bind(value);
    }
}

fn build_update(id: UserId, update: &AdminUserUpdate) -> QueryBuilder<'static, Postgres> {
    let p = &update.profile;
    let mut qb = QueryBuilder::new("UPDATE users AS u SET ");
    let mut first = true;
    push_set(&mut qb, &mut first, "first_name", p.first_name.clone());
    push_set(&mut qb, &mut first, "last_name", p.last_name.clone());
    push_set(&mut qb, &mut first, "date_of_birth", p.date_of_birth);
    push_set(&mut qb, &mut first, "gender", p.gender.clone());
    push_set(&mut qb, &mut first, "national_id", p.national_id.clone());
    push_set(&mut qb, &mut first, "address", p.address.clone());
    push_set(&mut qb, &mut first, "city", p.city.clone());
    push_set(&mut qb, &mut first, "country", p.country.clone());
    push_set(&mut qb, &mut first, "employment_status", p.employment_status.clone());
    push_set(&mut qb, &mut first, "employer_name", p.employer_name.clone());
    push_set(&mut qb, &mut first, "monthly_income", p.monthly_income);
    push_set(&mut qb, &mut first, "email", update.email.as_ref().map(|e| e.as_str().to_owned()));
    push_set(&mut qb, &mut first, "phone", update.phone.as_ref().map(|p| p.as_str().to_owned()));
    push_set(&mut qb, &mut first, "is_admin", update.is_admin);
    push_set(&mut qb, &mut first, "status", update.status);
    if !first {
        qb.push(", ");
    }
    qb.push("updated_at = NOW() WHERE u.id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(USER_COLUMNS);
    qb
}

fn push_customer_from_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &CustomerFilter) {
    qb.push(" FROM users u LEFT JOIN loan_totals lt ON lt.user_id = u.id");

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
    match filter.status {
        Some(status) => {
            conds.and().push("u.status = ").push_bind(status);
        }
        // Soft-deleted accounts are hidden unless asked for
        None => {
            conds.and().push("u.status <> 'deleted'");
        }
    }
    if let Some(is_admin) = filter.is_admin {
        conds.and().push("u.is_admin = ").push_bind(is_admin);
    }
    if let Some(min) = filter.min_loans {
        conds.and().push("COALESCE(lt.loan_count, 0) >= ").push_bind(min);
    }
    if let Some(max) = filter.max_loans {
        conds.and().push("COALESCE(lt.loan_count, 0) <= ").push_bind(max);
    }
    conds.min_decimal("COALESCE(lt.total_borrowed, 0)", filter.min_amount);
    conds.max_decimal("COALESCE(lt.total_borrowed, 0)", filter.max_amount);
    conds.date_range("u.created_at", filter.date_from, filter.date_to);
}

const fn customer_sort_expr(sort: CustomerSort) -> &'static str {
    match sort {
        CustomerSort::CreatedAt => "u.created_at",
        CustomerSort::Name => "lower(u.first_name || ' ' || u.last_name)",
        CustomerSort::Email => "u.email",
        CustomerSort::LoanCount => "COALESCE(lt.loan_count, 0)",
        CustomerSort::TotalBorrowed => "COALESCE(lt.total_borrowed, 0)",
        CustomerSort::LastLoginAt => "u.last_login_at",
    }
}

fn build_customer_count(filter: &CustomerFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(LOAN_TOTALS_CTE);
    qb.push("SELECT COUNT(*)");
    push_customer_from_where(&mut qb, filter);
    qb
}

fn build_customer_list(filter: &CustomerFilter, page: PageRequest) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(LOAN_TOTALS_CTE);
    qb.push("SELECT ")
        .push(USER_COLUMNS)
        .push(", COALESCE(lt.loan_count, 0) AS loan_count")
        .push(", COALESCE(lt.total_borrowed, 0) AS total_borrowed");
    push_customer_from_where(&mut qb, filter);
    push_order_and_page(
        &mut qb,
        customer_sort_expr(filter.sort_by),
        filter.sort_order.as_sql(),
        "u.id",
        page,
    );
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;

    #[test]
    fn test_customer_list_is_single_statement_with_cte() {
        let filter = CustomerFilter {
            search: Some("wanjiru".to_string()),
            min_loans: Some(2),
            ..CustomerFilter::default()
        };
        let qb = build_customer_list(&filter, PageRequest::default());
        let sql = qb.sql();
        assert!(sql.starts_with("WITH loan_totals AS"));
        assert!(sql.contains("LEFT JOIN loan_totals lt ON lt.user_id = u.id"));
        assert!(sql.contains("COALESCE(lt.loan_count, 0) >= $6"));
        assert!(sql.contains("u.status <> 'deleted'"));
        assert!(!sql.contains("wanjiru"));
        assert!(sql.ends_with("LIMIT $7 OFFSET $8"));
    }

    #[test]
    fn test_customer_count_shares_predicate() {
        let filter = CustomerFilter {
            status: Some(UserStatus::Suspended),
            max_amount: Some(Decimal::from(5_000)),
            ..CustomerFilter::default()
        };
        let count_sql = build_customer_count(&filter).sql().to_string();
        let list_sql = build_customer_list(&filter, PageRequest::default()).sql().to_string();
        let predicate = count_sql.split(" FROM users u").nth(1).unwrap_or_default();
        assert!(!predicate.is_empty());
        assert!(list_sql.contains(predicate));
        assert!(!count_sql.contains("ORDER BY"));
    }

    #[test]
    fn test_customer_sort_whitelist() {
        let filter = CustomerFilter {
            sort_by: CustomerSort::TotalBorrowed,
            sort_order: SortOrder::Asc,
            ..CustomerFilter::default()
        };
        let sql = build_customer_list(&filter, PageRequest::default()).sql().to_string();
        assert!(sql.contains("ORDER BY COALESCE(lt.total_borrowed, 0) ASC NULLS LAST, u.id ASC"));
    }

    #[test]
    fn test_update_only_touches_set_columns() {
        let update = AdminUserUpdate {
            is_admin: Some(true),
            status: Some(UserStatus::Suspended),
            ..AdminUserUpdate::default()
        };
        let sql = build_update(UserId::new(4), &update).sql().to_string();
        assert!(sql.starts_with("UPDATE users AS u SET is_admin = $1, status = $2, updated_at = NOW() WHERE u.id = $3"));
        assert!(!sql.contains("first_name ="));
    }
}
