//! Status enums for users, applications and transactions.

use serde::{Deserialize, Serialize};

/// Error returned when a status string does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Loan application lifecycle status.
///
/// ```text
/// pending ──> approved ──> disbursed ──> completed
///    │           │             │             ^
///    └──> rejected <┘          └──> defaulted ┘
/// ```
///
/// `rejected` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "application_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Completed,
    Defaulted,
}

impl ApplicationStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Disbursed,
        Self::Completed,
        Self::Defaulted,
    ];

    /// Whether an admin may move an application from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Disbursed | Self::Rejected)
                | (Self::Disbursed, Self::Completed | Self::Defaulted)
                | (Self::Defaulted, Self::Completed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Money has left the building and repayments are expected.
    #[must_use]
    pub const fn is_repayable(self) -> bool {
        matches!(self, Self::Disbursed | Self::Defaulted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Disbursed => "disbursed",
            Self::Completed => "completed",
            Self::Defaulted => "defaulted",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError::new("application status", s))
    }
}

/// Account status. Users are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

impl UserStatus {
    /// Only active accounts may hold a session.
    #[must_use]
    pub const fn can_sign_in(self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "deleted" => Ok(Self::Deleted),
            _ => Err(ParseStatusError::new("user status", s)),
        }
    }
}

/// Kind of ledger entry recorded against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "transaction_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Loan principal paid out to the customer.
    Disbursement,
    /// Money received from the customer.
    Repayment,
    /// Charge added to the outstanding balance.
    Fee,
}

impl TransactionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disbursement => "disbursement",
            Self::Repayment => "repayment",
            Self::Fee => "fee",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disbursement" => Ok(Self::Disbursement),
            "repayment" => Ok(Self::Repayment),
            "fee" => Ok(Self::Fee),
            _ => Err(ParseStatusError::new("transaction kind", s)),
        }
    }
}

/// How an account was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "auth_provider", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Phone,
    Credentials,
    Google,
    Facebook,
    Github,
}

impl AuthProvider {
    /// Whether this provider signs in through an OAuth redirect.
    #[must_use]
    pub const fn is_oauth(self) -> bool {
        matches!(self, Self::Google | Self::Facebook | Self::Github)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Credentials => "credentials",
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Github => "github",
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthProvider {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "credentials" => Ok(Self::Credentials),
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "github" => Ok(Self::Github),
            _ => Err(ParseStatusError::new("auth provider", s)),
        }
    }
}
