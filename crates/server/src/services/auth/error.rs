//! Authentication error types.

use thiserror::Error;
use ubuntu_lend_core::AuthProvider;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ubuntu_lend_core::EmailError),

    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] ubuntu_lend_core::PhoneError),

    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Code is not six ASCII digits. Raised before any lookup.
    #[error("malformed verification code")]
    InvalidCodeFormat,

    /// No live code for the phone, the code expired, or it did not match.
    #[error("invalid or expired verification code")]
    InvalidCode,

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    /// Email or phone is already registered; names the field.
    #[error("user with this {0} already exists")]
    UserAlreadyExists(&'static str),

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Suspended or deleted account.
    #[error("account is not active")]
    AccountDisabled,

    #[error("oauth provider {0} is not configured")]
    ProviderNotConfigured(AuthProvider),

    /// OAuth `state` missing from the session or not matching the callback.
    #[error("oauth state mismatch")]
    InvalidOAuthState,

    #[error("oauth exchange failed: {0}")]
    OAuthExchange(String),

    #[error("oauth profile has no email address")]
    MissingProfileEmail,

    #[error("pending sign-up not found or expired")]
    PendingSignupNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("password hashing error")]
    PasswordHash,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::OAuthExchange(err.to_string())
    }
}
