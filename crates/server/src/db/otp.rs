//! One-time code storage.
//!
//! Only HMAC digests are stored. Issuing a new code for a phone invalidates
//! any code still live for it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ubuntu_lend_core::PhoneNumber;

use super::RepositoryError;

/// A live (unconsumed, unexpired) code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub id: i32,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
}

/// Repository for issued OTP codes.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new code digest for `phone`, retiring any previous live code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn replace(
        &self,
        phone: &PhoneNumber,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM otp_codes WHERE phone = $1 AND consumed_at IS NULL")
            .bind(phone.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO otp_codes (phone, code_hash, expires_at) VALUES ($1, $2, $3)")
            .bind(phone.as_str())
            .bind(code_hash)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// The newest live code for `phone`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_live(&self, phone: &PhoneNumber) -> Result<Option<OtpRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            "SELECT id, code_hash, attempts, expires_at FROM otp_codes \
             WHERE phone = $1 AND consumed_at IS NULL AND expires_at > NOW() \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(record)
    }

    /// Spend one verification attempt on a live code.
    ///
    /// The increment and the cap check are a single statement, so concurrent
    /// guesses cannot overrun `max_attempts`. Returns `false` when the code is
    /// out of attempts, consumed or expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn spend_attempt(&self, id: i32, max_attempts: i32) -> Result<bool, RepositoryError> {
        let spent: Option<i32> = sqlx::query_scalar(
            "UPDATE otp_codes SET attempts = attempts + 1 \
             WHERE id = $1 AND attempts < $2 AND consumed_at IS NULL AND expires_at > NOW() \
             RETURNING attempts",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(spent.is_some())
    }

    /// Mark a code as used. Returns `false` if it was already consumed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume(&self, id: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE otp_codes SET consumed_at = NOW() WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete codes that expired more than a day ago.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM otp_codes WHERE expires_at < NOW() - INTERVAL '1 day'")
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
