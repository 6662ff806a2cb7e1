//! First-time OAuth profiles awaiting confirmation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use ubuntu_lend_core::{AuthProvider, Email};

use super::RepositoryError;

/// An OAuth profile parked until the user confirms sign-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSignup {
    #[serde(skip)]
    pub token: String,
    pub provider: AuthProvider,
    #[serde(skip)]
    pub provider_account_id: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingSignupRow {
    token: String,
    provider: AuthProvider,
    provider_account_id: String,
    email: String,
    first_name: String,
    last_name: String,
    avatar_url: Option<String>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<PendingSignupRow> for PendingSignup {
    type Error = RepositoryError;

    fn try_from(row: PendingSignupRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in pending signup: {e}"))
        })?;
        Ok(Self {
            token: row.token,
            provider: row.provider,
            provider_account_id: row.provider_account_id,
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            expires_at: row.expires_at,
        })
    }
}

/// Repository for pending OAuth sign-ups.
pub struct PendingSignupRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PendingSignupRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Park a profile under its token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, signup: &PendingSignup) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pending_oauth_signups (token, provider, provider_account_id, email, \
                 first_name, last_name, avatar_url, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&signup.token)
        .bind(signup.provider)
        .bind(&signup.provider_account_id)
        .bind(signup.email.as_str())
        .bind(&signup.first_name)
        .bind(&signup.last_name)
        .bind(signup.avatar_url.as_deref())
        .bind(signup.expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an unexpired profile by token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, token: &str) -> Result<Option<PendingSignup>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingSignupRow>(
            "SELECT token, provider, provider_account_id, email, first_name, last_name, \
                 avatar_url, expires_at \
             FROM pending_oauth_signups WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        row.map(PendingSignup::try_from).transpose()
    }

    /// Remove a profile once it has been confirmed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM pending_oauth_signups WHERE token = $1 OR expires_at < NOW()")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete every expired profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM pending_oauth_signups WHERE expires_at < NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
