//! User domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ubuntu_lend_core::{AuthProvider, Email, PhoneNumber, UserId, UserStatus};

use super::SortOrder;

/// A customer or admin account.
///
/// The password hash is deliberately absent; it is only ever read by the
/// credentials login query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    /// E.164 phone number, unique when present.
    pub phone: Option<PhoneNumber>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub is_admin: bool,
    pub status: UserStatus,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub employment_status: Option<String>,
    pub employer_name: Option<String>,
    pub monthly_income: Option<Decimal>,
    /// How the account was first created.
    pub auth_provider: AuthProvider,
    pub avatar_url: Option<String>,
    pub login_count: i32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A customer row in the admin list, with lending totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub user: User,
    /// Number of applications the customer has submitted.
    pub loan_count: i64,
    /// Sum of requested amounts across those applications.
    pub total_borrowed: Decimal,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<PhoneNumber>,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub auth_provider: AuthProvider,
    pub avatar_url: Option<String>,
}

/// Profile fields a user may change on their own account.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub employment_status: Option<String>,
    pub employer_name: Option<String>,
    pub monthly_income: Option<Decimal>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.national_id.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.country.is_none()
            && self.employment_status.is_none()
            && self.employer_name.is_none()
            && self.monthly_income.is_none()
    }
}

/// Fields an admin may change on any account.
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub profile: ProfileUpdate,
    pub email: Option<Email>,
    pub phone: Option<PhoneNumber>,
    pub is_admin: Option<bool>,
    pub status: Option<UserStatus>,
}

impl AdminUserUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.profile.is_empty()
            && self.email.is_none()
            && self.phone.is_none()
            && self.is_admin.is_none()
            && self.status.is_none()
    }
}

/// Sortable columns of the customer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerSort {
    #[default]
    CreatedAt,
    Name,
    Email,
    LoanCount,
    TotalBorrowed,
    LastLoginAt,
}

impl std::str::FromStr for CustomerSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "loanCount" => Ok(Self::LoanCount),
            "totalBorrowed" => Ok(Self::TotalBorrowed),
            "lastLoginAt" => Ok(Self::LastLoginAt),
            _ => Err(format!("cannot sort customers by {s}")),
        }
    }
}

/// Filters for the admin customer list.
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Case-insensitive match on name, email or phone.
    pub search: Option<String>,
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
    pub min_loans: Option<i64>,
    pub max_loans: Option<i64>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: CustomerSort,
    pub sort_order: SortOrder,
}
