//! Phone, password and session route handlers.
//!
//! Every successful sign-in stores a [`CurrentUser`] in the session under a
//! fresh session ID.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppJson, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_session, session_user, set_current_user};
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::response::ApiResponse;
use crate::services::{AuthError, AuthService, Registration};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub phone: String,
    #[serde(default)]
    pub country_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
    /// Last four digits of the number the code went to.
    pub phone_last_four: String,
    pub expires_in_seconds: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub phone: String,
    #[serde(default)]
    pub country_code: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Put `user` in the session and tag Sentry with them.
pub(crate) async fn sign_in(session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

/// Send a one-time code by SMS.
///
/// # Route
///
/// `POST /api/auth/otp/send`
pub async fn send_otp(
    State(state): State<AppState>,
    AppJson(request): AppJson<SendOtpRequest>,
) -> Result<ApiResponse<OtpSent>> {
    let auth = AuthService::new(state.pool(), state.config());
    let phone = auth
        .send_otp(&request.country_code, &request.phone, state.notifier())
        .await?;

    Ok(ApiResponse::ok(OtpSent {
        phone_last_four: phone.last_four().to_string(),
        expires_in_seconds: state.config().otp_ttl.as_secs(),
    }))
}

/// Sign in with a one-time code.
///
/// A wrong code never creates a session.
///
/// # Route
///
/// `POST /api/auth/otp/verify`
pub async fn verify_otp(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<VerifyOtpRequest>,
) -> Result<ApiResponse<User>> {
    let auth = AuthService::new(state.pool(), state.config());
    let user = auth
        .verify_otp(&request.country_code, &request.phone, &request.code)
        .await?;
    sign_in(&session, &user).await?;
    Ok(ApiResponse::ok(user))
}

/// Create an account verified by a one-time code.
///
/// # Route
///
/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<Registration>,
) -> Result<ApiResponse<User>> {
    let auth = AuthService::new(state.pool(), state.config());
    let user = auth.register(&request).await?;
    sign_in(&session, &user).await?;
    Ok(ApiResponse::created(user))
}

/// Sign in with email and password.
///
/// # Route
///
/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<ApiResponse<User>> {
    let auth = AuthService::new(state.pool(), state.config());
    let user = auth
        .login_with_password(&request.email, &request.password)
        .await?;
    sign_in(&session, &user).await?;
    Ok(ApiResponse::ok(user))
}

/// Sign out.
///
/// # Route
///
/// `POST /api/auth/logout`
pub async fn logout(session: Session) -> Result<ApiResponse<()>> {
    clear_session(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::ok(()))
}

/// The signed-in user, re-read from the database, or `null`.
///
/// # Route
///
/// `GET /api/auth/session`
pub async fn current_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<ApiResponse<Option<User>>> {
    let Some(cached) = session_user(&session).await? else {
        return Ok(ApiResponse::ok(None));
    };

    let auth = AuthService::new(state.pool(), state.config());
    match auth.get_active_user(cached.id).await {
        Ok(user) => Ok(ApiResponse::ok(Some(user))),
        Err(AuthError::UserNotFound | AuthError::AccountDisabled) => {
            clear_session(&session).await?;
            Ok(ApiResponse::ok(None))
        }
        Err(e) => Err(e.into()),
    }
}
