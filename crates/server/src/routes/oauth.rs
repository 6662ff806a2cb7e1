//! OAuth sign-in route handlers.
//!
//! - Login: stores a random `state` in the session and redirects to the provider
//! - Callback: validates `state`, exchanges the code and signs the user in, or
//!   parks a first-time profile and redirects to the confirmation page
//! - Pending/confirm: read and accept a parked profile
//!
//! Browser-facing failures redirect to `/auth/login?error=<code>`.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use ubuntu_lend_core::AuthProvider;

use super::auth::sign_in;
use crate::db::pending_signups::PendingSignup;
use crate::error::{AppError, AppJson, AppPath, Result};
use crate::models::session_keys;
use crate::models::user::User;
use crate::response::ApiResponse;
use crate::services::auth::{generate_token, oauth::redirect_uri};
use crate::services::{AuthError, AuthService, OAuthClient, OAuthOutcome};
use crate::state::AppState;

/// Length of the CSRF `state` parameter.
const STATE_LENGTH: usize = 32;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    pub callback_url: Option<String>,
}

/// Query parameters from the provider's redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

fn login_error(code: &str) -> Response {
    Redirect::to(&format!("/auth/login?error={code}")).into_response()
}

/// Only same-site paths are honoured as post-login destinations.
fn safe_callback(url: Option<&str>) -> Option<String> {
    url.filter(|u| u.starts_with('/') && !u.starts_with("//") && !u.contains('\\'))
        .map(String::from)
}

fn parse_provider(provider: &str) -> Result<AuthProvider> {
    provider
        .parse::<AuthProvider>()
        .ok()
        .filter(|p| p.is_oauth())
        .ok_or_else(|| AppError::NotFound(format!("Unknown sign-in provider: {provider}")))
}

/// Redirect to the provider's consent page.
///
/// # Route
///
/// `GET /api/auth/oauth/{provider}/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    AppPath(provider): AppPath<String>,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    let provider = parse_provider(&provider)?;
    let client = OAuthClient::new(
        provider,
        state.config().oauth.client(provider),
        state.http(),
    )?;

    let oauth_state = generate_token(STATE_LENGTH);
    session
        .insert(session_keys::OAUTH_STATE, &oauth_state)
        .await?;
    match safe_callback(query.callback_url.as_deref()) {
        Some(callback) => {
            session
                .insert(session_keys::OAUTH_CALLBACK_URL, callback)
                .await?;
        }
        None => {
            session
                .remove::<String>(session_keys::OAUTH_CALLBACK_URL)
                .await?;
        }
    }

    let url = client.authorization_url(
        &redirect_uri(&state.config().base_url, provider),
        &oauth_state,
    )?;
    Ok(Redirect::to(&url).into_response())
}

/// Handle the provider's redirect.
///
/// # Route
///
/// `GET /api/auth/oauth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    AppPath(provider): AppPath<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Ok(provider) = parse_provider(&provider) else {
        return login_error("unknown_provider");
    };

    if let Some(error) = query.error {
        tracing::warn!(
            %provider,
            error = %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "OAuth provider returned an error"
        );
        return login_error("access_denied");
    }

    let Some(code) = query.code else {
        tracing::warn!(%provider, "OAuth callback missing code");
        return login_error("missing_code");
    };

    let stored_state: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();
    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!(%provider, "OAuth state mismatch");
        return login_error("invalid_state");
    }
    let callback_url: Option<String> = session
        .remove(session_keys::OAUTH_CALLBACK_URL)
        .await
        .ok()
        .flatten();

    match complete(&state, provider, &code).await {
        Ok(OAuthOutcome::SignedIn(user)) => {
            if let Err(e) = sign_in(&session, &user).await {
                tracing::error!(error = %e, "Failed to store session after OAuth sign-in");
                return login_error("session");
            }
            tracing::info!(user_id = %user.id, %provider, "OAuth sign-in");
            let home = if user.is_admin { "/admin" } else { "/dashboard" };
            Redirect::to(callback_url.as_deref().unwrap_or(home)).into_response()
        }
        Ok(OAuthOutcome::PendingConfirmation(token)) => {
            Redirect::to(&format!("/auth/confirm?token={token}")).into_response()
        }
        Err(AuthError::MissingProfileEmail) => login_error("email_required"),
        Err(AuthError::AccountDisabled) => login_error("account_disabled"),
        Err(e) => {
            tracing::error!(error = %e, %provider, "OAuth sign-in failed");
            login_error("oauth_failed")
        }
    }
}

async fn complete(
    state: &AppState,
    provider: AuthProvider,
    code: &str,
) -> std::result::Result<OAuthOutcome, AuthError> {
    let client = OAuthClient::new(
        provider,
        state.config().oauth.client(provider),
        state.http(),
    )?;
    let redirect = redirect_uri(&state.config().base_url, provider);
    let access_token = client.exchange_code(code, &redirect).await?;
    let profile = client.fetch_profile(&access_token).await?;

    AuthService::new(state.pool(), state.config())
        .complete_oauth(profile)
        .await
}

/// The parked profile behind a confirmation link.
///
/// # Route
///
/// `GET /api/auth/oauth/pending/{token}`
pub async fn pending(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
) -> Result<ApiResponse<PendingSignup>> {
    let auth = AuthService::new(state.pool(), state.config());
    Ok(ApiResponse::ok(auth.pending_signup(&token).await?))
}

/// Create the account for a parked profile and sign in.
///
/// # Route
///
/// `POST /api/auth/oauth/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<ConfirmRequest>,
) -> Result<ApiResponse<User>> {
    let auth = AuthService::new(state.pool(), state.config());
    let user = auth.confirm_pending_signup(&request.token).await?;
    sign_in(&session, &user).await?;
    Ok(ApiResponse::created(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_callback() {
        assert_eq!(
            safe_callback(Some("/dashboard/loans?tab=1")).as_deref(),
            Some("/dashboard/loans?tab=1")
        );
        assert_eq!(safe_callback(Some("//evil.example")), None);
        assert_eq!(safe_callback(Some("https://evil.example")), None);
        assert_eq!(safe_callback(Some("/\\evil.example")), None);
        assert_eq!(safe_callback(None), None);
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("github").ok(), Some(AuthProvider::Github));
        assert!(parse_provider("phone").is_err());
        assert!(parse_provider("myspace").is_err());
    }
}
