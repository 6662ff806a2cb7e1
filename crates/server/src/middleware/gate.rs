//! Path-based access control.
//!
//! Every request to a protected path is checked against the session before
//! any handler runs:
//!
//! | Path                                                    | Requires    |
//! |---------------------------------------------------------|-------------|
//! | `/admin`, `/admin/**`, `/api/admin/**`                  | admin       |
//! | `/dashboard/**`, `/api/users/**`, `/api/applications/**`, `/api/loans/**` | signed in |
//! | anything else                                           | nothing     |
//!
//! Anonymous requests are redirected to the login page with a `callbackUrl`;
//! signed-in non-admins on admin paths are redirected to `/dashboard`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use super::auth::{clear_session, session_user};
use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Where a signed-out visitor is sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Where a signed-in customer is sent when they reach an admin path.
pub const USER_HOME_PATH: &str = "/dashboard";

const ADMIN_PREFIXES: &[&str] = &["/admin", "/api/admin"];
const USER_PREFIXES: &[&str] = &[
    "/dashboard",
    "/api/users",
    "/api/applications",
    "/api/loans",
];

/// Who may reach a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    User,
    Admin,
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    /// Redirect to the login page, carrying the URL to come back to.
    Login { callback_url: String },
    /// Signed in, but not an admin.
    UserHome,
}

fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Classify a request path.
#[must_use]
pub fn access_for(path: &str) -> Access {
    if ADMIN_PREFIXES.iter().any(|prefix| under(path, prefix)) {
        Access::Admin
    } else if USER_PREFIXES.iter().any(|prefix| under(path, prefix)) {
        Access::User
    } else {
        Access::Public
    }
}

/// Decide what happens to a request for `path_and_query`.
#[must_use]
pub fn decide(path_and_query: &str, user: Option<&CurrentUser>) -> Decision {
    let path = path_and_query
        .split_once('?')
        .map_or(path_and_query, |(path, _)| path);

    match (access_for(path), user) {
        (Access::Public, _) => Decision::Proceed,
        (_, None) => Decision::Login {
            callback_url: path_and_query.to_string(),
        },
        (Access::Admin, Some(user)) if !user.is_admin => Decision::UserHome,
        (Access::User | Access::Admin, Some(_)) => Decision::Proceed,
    }
}

/// Login URL that returns to `callback_url` afterwards.
#[must_use]
pub fn login_redirect(callback_url: &str) -> String {
    format!(
        "{LOGIN_PATH}?callbackUrl={}",
        urlencoding::encode(callback_url)
    )
}

/// Re-read the session user from the database.
///
/// Users that were deleted or suspended since signing in are signed out.
async fn refresh_user(
    state: &AppState,
    session: &Session,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(cached) = session_user(session).await? else {
        return Ok(None);
    };

    let auth = AuthService::new(state.pool(), state.config());
    match auth.get_active_user(cached.id).await {
        Ok(user) => {
            let fresh = CurrentUser::from(&user);
            if fresh != cached {
                session.insert(session_keys::CURRENT_USER, &fresh).await?;
            }
            Ok(Some(fresh))
        }
        Err(AuthError::UserNotFound | AuthError::AccountDisabled) => {
            tracing::info!(user_id = %cached.id, "Signing out inactive user");
            clear_session(session).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Enforce [`decide`] for every request.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn gate_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);

    if access_for(request.uri().path()) == Access::Public {
        return next.run(request).await;
    }

    let user = match refresh_user(&state, &session).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    match decide(&path_and_query, user.as_ref()) {
        Decision::Proceed => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Decision::Login { callback_url } => {
            Redirect::to(&login_redirect(&callback_url)).into_response()
        }
        Decision::UserHome => {
            tracing::debug!("Non-admin redirected away from admin path");
            Redirect::to(USER_HOME_PATH).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use ubuntu_lend_core::{Email, UserId, UserStatus};

    use super::*;

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: Email::parse("amara@example.com").expect("valid email"),
            phone: None,
            name: "Amara Okafor".to_string(),
            is_admin,
            status: UserStatus::Active,
        }
    }

    #[test]
    fn test_access_for() {
        assert_eq!(access_for("/admin"), Access::Admin);
        assert_eq!(access_for("/admin/customers"), Access::Admin);
        assert_eq!(access_for("/api/admin/users"), Access::Admin);
        assert_eq!(access_for("/dashboard"), Access::User);
        assert_eq!(access_for("/dashboard/loans"), Access::User);
        assert_eq!(access_for("/api/users/me"), Access::User);
        assert_eq!(access_for("/api/applications"), Access::User);
        assert_eq!(access_for("/api/loans/next-payment"), Access::User);
        assert_eq!(access_for("/"), Access::Public);
        assert_eq!(access_for("/auth/login"), Access::Public);
        assert_eq!(access_for("/api/auth/session"), Access::Public);
        assert_eq!(access_for("/api/loan-types"), Access::Public);
        assert_eq!(access_for("/administrator"), Access::Public);
        assert_eq!(access_for("/api/loansharks"), Access::Public);
    }

    #[test]
    fn test_anonymous_is_sent_to_login() {
        assert_eq!(
            decide("/api/admin/users?page=2", None),
            Decision::Login {
                callback_url: "/api/admin/users?page=2".to_string()
            }
        );
        assert_eq!(
            decide("/dashboard", None),
            Decision::Login {
                callback_url: "/dashboard".to_string()
            }
        );
        assert_eq!(decide("/api/loan-types", None), Decision::Proceed);
    }

    #[test]
    fn test_non_admin_never_reaches_admin_paths() {
        let customer = user(false);
        assert_eq!(decide("/admin", Some(&customer)), Decision::UserHome);
        assert_eq!(
            decide("/api/admin/dashboard", Some(&customer)),
            Decision::UserHome
        );
        assert_eq!(decide("/api/users/me", Some(&customer)), Decision::Proceed);
    }

    #[test]
    fn test_admin_reaches_everything() {
        let admin = user(true);
        assert_eq!(decide("/admin/loans", Some(&admin)), Decision::Proceed);
        assert_eq!(decide("/api/loans/term", Some(&admin)), Decision::Proceed);
    }

    #[test]
    fn test_login_redirect_encodes_callback() {
        assert_eq!(
            login_redirect("/api/admin/users?page=2&status=active"),
            "/auth/login?callbackUrl=%2Fapi%2Fadmin%2Fusers%3Fpage%3D2%26status%3Dactive"
        );
    }
}
