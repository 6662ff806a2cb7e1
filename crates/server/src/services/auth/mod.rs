//! Authentication service.
//!
//! Provides phone + one-time-code sign-in and registration, email/password
//! login, and OAuth sign-in with a confirmation step for first-time accounts.

mod error;
pub mod oauth;
pub mod otp;

pub use error::AuthError;
pub use oauth::{OAuthClient, OAuthProfile};

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use rand::Rng;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use ubuntu_lend_core::{AuthProvider, Email, PhoneNumber, UserId};

use crate::config::ServerConfig;
use crate::db::RepositoryError;
use crate::db::pending_signups::PendingSignup;
use crate::db::{OtpRepository, PendingSignupRepository, UserRepository};
use crate::models::user::{NewUser, User};
use crate::services::notify::Notifier;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum length of a first or last name.
const MAX_NAME_LENGTH: usize = 100;

/// How long a first-time OAuth profile waits for confirmation.
pub const PENDING_SIGNUP_TTL: Duration = Duration::from_secs(15 * 60);

/// Phone-based registration input.
///
/// No `Debug`: it carries the password and the one-time code.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country_code: String,
    pub phone: String,
    pub code: String,
    pub password: Option<String>,
}

/// Result of completing an OAuth callback.
#[derive(Debug)]
pub enum OAuthOutcome {
    /// The profile's email belongs to an existing account.
    SignedIn(User),
    /// First sign-in; the profile is parked under this token.
    PendingConfirmation(String),
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    otp_codes: OtpRepository<'a>,
    pending: PendingSignupRepository<'a>,
    otp_secret: &'a [u8],
    otp_ttl: Duration,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(pool: &'a PgPool, config: &'a ServerConfig) -> Self {
        Self {
            users: UserRepository::new(pool),
            otp_codes: OtpRepository::new(pool),
            pending: PendingSignupRepository::new(pool),
            otp_secret: config.session_secret.expose_secret().as_bytes(),
            otp_ttl: config.otp_ttl,
        }
    }

    // =========================================================================
    // One-Time Codes
    // =========================================================================

    /// Issue a code for a phone number and hand it to the SMS notifier.
    ///
    /// Succeeds for any valid number, whether or not an account uses it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` if the number cannot be normalized.
    #[instrument(skip(self, notifier, phone))]
    pub async fn send_otp(
        &self,
        country_code: &str,
        phone: &str,
        notifier: &Notifier,
    ) -> Result<PhoneNumber, AuthError> {
        let phone = PhoneNumber::parse(country_code, phone)?;
        let code = otp::generate_code();
        let ttl = chrono::Duration::from_std(self.otp_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));

        self.otp_codes
            .replace(&phone, &otp::digest(self.otp_secret, &phone, &code), Utc::now() + ttl)
            .await?;

        notifier.send_otp(&phone, &code, self.otp_ttl.as_secs().div_ceil(60));
        tracing::info!(phone_last_four = %phone.last_four(), "OTP issued");
        Ok(phone)
    }

    /// Sign in with a phone number and one-time code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` or `AuthError::InvalidCodeFormat` for
    /// malformed input, `AuthError::InvalidCode` if the code does not check
    /// out, and `AuthError::UserNotFound` if no account uses the number.
    #[instrument(skip_all)]
    pub async fn verify_otp(
        &self,
        country_code: &str,
        phone: &str,
        code: &str,
    ) -> Result<User, AuthError> {
        let phone = PhoneNumber::parse(country_code, phone)?;
        let code = otp::parse_code(code)?;

        self.consume_code(&phone, code).await?;

        let user = self
            .users
            .get_by_phone(&phone)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        ensure_can_sign_in(&user)?;

        if !user.phone_verified {
            self.users.mark_phone_verified(user.id).await?;
        }
        Ok(self.users.record_login(user.id).await?)
    }

    /// Check a code against the live one for `phone` and consume it on a match.
    async fn consume_code(&self, phone: &PhoneNumber, code: &str) -> Result<(), AuthError> {
        let record = self
            .otp_codes
            .find_live(phone)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        // Every check costs an attempt, including the one that matches
        if !self
            .otp_codes
            .spend_attempt(record.id, otp::MAX_ATTEMPTS)
            .await?
        {
            tracing::info!(phone_last_four = %phone.last_four(), "OTP attempts exhausted");
            return Err(AuthError::InvalidCode);
        }

        if !otp::verify(self.otp_secret, phone, code, &record.code_hash) {
            tracing::info!(phone_last_four = %phone.last_four(), "OTP mismatch");
            return Err(AuthError::InvalidCode);
        }

        if !self.otp_codes.consume(record.id).await? {
            return Err(AuthError::InvalidCode);
        }
        Ok(())
    }

    // =========================================================================
    // Registration and Password Login
    // =========================================================================

    /// Register a new account verified by a one-time code.
    ///
    /// # Errors
    ///
    /// Returns validation errors before touching the code, and
    /// `AuthError::UserAlreadyExists` if the email or phone is taken.
    #[instrument(skip_all)]
    pub async fn register(&self, input: &Registration) -> Result<User, AuthError> {
        let first_name = validate_name(&input.first_name, "first name")?;
        let last_name = validate_name(&input.last_name, "last name")?;
        let email = Email::parse(&input.email)?;
        let phone = PhoneNumber::parse(&input.country_code, &input.phone)?;
        let code = otp::parse_code(&input.code)?;
        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists("email"));
        }
        if self.users.get_by_phone(&phone).await?.is_some() {
            return Err(AuthError::UserAlreadyExists("phone"));
        }

        self.consume_code(&phone, code).await?;

        let user = self
            .users
            .create(&NewUser {
                first_name,
                last_name,
                email,
                phone: Some(phone),
                password_hash,
                email_verified: false,
                phone_verified: true,
                auth_provider: AuthProvider::Phone,
                avatar_url: None,
            })
            .await
            .map_err(map_create_conflict)?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(self.users.record_login(user.id).await?)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        ensure_can_sign_in(&user)?;

        Ok(self.users.record_login(user.id).await?)
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Sign in an existing account by profile email, or park the profile for
    /// confirmation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingProfileEmail` if the provider shared no
    /// usable email, `AuthError::AccountDisabled` for inactive accounts.
    #[instrument(skip_all, fields(provider = %profile.provider))]
    pub async fn complete_oauth(&self, profile: OAuthProfile) -> Result<OAuthOutcome, AuthError> {
        let email = profile
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|_| AuthError::MissingProfileEmail)?
            .ok_or(AuthError::MissingProfileEmail)?;

        if let Some(user) = self.users.get_by_email(&email).await? {
            ensure_can_sign_in(&user)?;
            let user = self.users.record_login(user.id).await?;
            return Ok(OAuthOutcome::SignedIn(user));
        }

        let ttl = chrono::Duration::from_std(PENDING_SIGNUP_TTL)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let token = generate_token(43);
        self.pending
            .insert(&PendingSignup {
                token: token.clone(),
                provider: profile.provider,
                provider_account_id: profile.account_id,
                email,
                first_name: profile.first_name,
                last_name: profile.last_name,
                avatar_url: profile.avatar_url,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        Ok(OAuthOutcome::PendingConfirmation(token))
    }

    /// Look up a parked OAuth profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PendingSignupNotFound` if the token is unknown or expired.
    pub async fn pending_signup(&self, token: &str) -> Result<PendingSignup, AuthError> {
        self.pending
            .get(token)
            .await?
            .ok_or(AuthError::PendingSignupNotFound)
    }

    /// Create the account for a parked OAuth profile and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PendingSignupNotFound` if the token is unknown or
    /// expired, `AuthError::UserAlreadyExists` if the email was taken since.
    #[instrument(skip_all)]
    pub async fn confirm_pending_signup(&self, token: &str) -> Result<User, AuthError> {
        let pending = self.pending_signup(token).await?;

        let first_name = if pending.first_name.trim().is_empty() {
            pending.email.as_str().split('@').next().unwrap_or_default().to_string()
        } else {
            pending.first_name.trim().to_string()
        };

        let user = self
            .users
            .create(&NewUser {
                first_name,
                last_name: pending.last_name.trim().to_string(),
                email: pending.email.clone(),
                phone: None,
                password_hash: None,
                email_verified: true,
                phone_verified: false,
                auth_provider: pending.provider,
                avatar_url: pending.avatar_url.clone(),
            })
            .await
            .map_err(map_create_conflict)?;

        self.pending.delete(token).await?;
        tracing::info!(user_id = %user.id, provider = %pending.provider, "OAuth user confirmed");
        Ok(self.users.record_login(user.id).await?)
    }

    /// Re-read a user for the session, failing if they may no longer sign in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` or `AuthError::AccountDisabled`.
    pub async fn get_active_user(&self, user_id: UserId) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        ensure_can_sign_in(&user)?;
        Ok(user)
    }
}

fn map_create_conflict(err: RepositoryError) -> AuthError {
    match err {
        RepositoryError::Conflict(field) if field == "phone" => AuthError::UserAlreadyExists("phone"),
        RepositoryError::Conflict(_) => AuthError::UserAlreadyExists("email"),
        other => AuthError::Repository(other),
    }
}

const fn ensure_can_sign_in(user: &User) -> Result<(), AuthError> {
    if user.status.can_sign_in() {
        Ok(())
    } else {
        Err(AuthError::AccountDisabled)
    }
}

/// Generate a cryptographically secure random alphanumeric string.
#[must_use]
pub fn generate_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            // SAFETY: idx is always within bounds since random_range returns 0..CHARSET.len()
            char::from(*CHARSET.get(idx).expect("idx within bounds"))
        })
        .collect()
}

/// Trim a name and check it is present and not absurdly long.
///
/// # Errors
///
/// Returns `AuthError::InvalidName` naming the field.
pub fn validate_name(name: &str, field: &'static str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName(format!("{field} is required")));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if it is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse battery").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Amina ", "first name").ok().as_deref(), Some("Amina"));
        assert!(matches!(
            validate_name("   ", "last name"),
            Err(AuthError::InvalidName(msg)) if msg == "last name is required"
        ));
        assert!(validate_name(&"x".repeat(101), "first name").is_err());
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token(43);
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token(43));
    }

    #[test]
    fn test_map_create_conflict_names_field() {
        assert!(matches!(
            map_create_conflict(RepositoryError::Conflict("phone".to_string())),
            AuthError::UserAlreadyExists("phone")
        ));
        assert!(matches!(
            map_create_conflict(RepositoryError::Conflict("email".to_string())),
            AuthError::UserAlreadyExists("email")
        ));
        assert!(matches!(
            map_create_conflict(RepositoryError::NotFound),
            AuthError::Repository(RepositoryError::NotFound)
        ));
    }
}
