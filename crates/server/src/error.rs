//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as the JSON
//! envelope `{ "success": false, "error": "..." }`; server errors are captured
//! to Sentry first and never leak internal detail outside debug builds.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use ubuntu_lend_core::{EmailError, LoanMathError, PhoneError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::lending::LendingError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request failed validation.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details are never included.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg))
            | Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Auth(err) => auth_message(err),
            Self::RateLimited => "Too many requests, please slow down".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail(_)
        | AuthError::InvalidPhone(_)
        | AuthError::InvalidName(_)
        | AuthError::WeakPassword(_)
        | AuthError::InvalidCodeFormat
        | AuthError::InvalidOAuthState
        | AuthError::MissingProfileEmail => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials | AuthError::InvalidCode => StatusCode::UNAUTHORIZED,
        AuthError::AccountDisabled => StatusCode::FORBIDDEN,
        AuthError::UserNotFound
        | AuthError::ProviderNotConfigured(_)
        | AuthError::PendingSignupNotFound => StatusCode::NOT_FOUND,
        AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
        AuthError::OAuthExchange(_) => StatusCode::BAD_GATEWAY,
        AuthError::Repository(repo) => repository_status(repo),
        AuthError::PasswordHash | AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn auth_message(err: &AuthError) -> String {
    match err {
        AuthError::InvalidEmail(e) => format!("Invalid email address: {e}"),
        AuthError::InvalidPhone(e) => format!("Invalid phone number: {e}"),
        AuthError::InvalidName(msg) | AuthError::WeakPassword(msg) => msg.clone(),
        AuthError::InvalidCodeFormat => "Verification code must be 6 digits".to_string(),
        AuthError::InvalidCode => "Invalid or expired code".to_string(),
        AuthError::InvalidCredentials => "Invalid credentials".to_string(),
        AuthError::UserNotFound => "User not found".to_string(),
        AuthError::UserAlreadyExists(field) => {
            format!("An account with this {field} already exists")
        }
        AuthError::AccountDisabled => "Account is disabled".to_string(),
        AuthError::ProviderNotConfigured(provider) => {
            format!("Sign-in with {provider} is not available")
        }
        AuthError::InvalidOAuthState => "Sign-in session expired, please try again".to_string(),
        AuthError::MissingProfileEmail => {
            "Your account did not share an email address".to_string()
        }
        AuthError::PendingSignupNotFound => "Sign-up link is invalid or has expired".to_string(),
        AuthError::OAuthExchange(_) => "External service error".to_string(),
        AuthError::Repository(RepositoryError::NotFound) => "Not found".to_string(),
        AuthError::Repository(RepositoryError::Conflict(msg)) => msg.clone(),
        AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Session(_) => {
            "Internal server error".to_string()
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let details = (cfg!(debug_assertions) && status.is_server_error()).then(|| self.to_string());
        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        Self::BadRequest(format!("Invalid email address: {err}"))
    }
}

impl From<PhoneError> for AppError {
    fn from(err: PhoneError) -> Self {
        Self::BadRequest(format!("Invalid phone number: {err}"))
    }
}

impl From<LoanMathError> for AppError {
    fn from(err: LoanMathError) -> Self {
        match err {
            LoanMathError::Overflow => Self::Internal(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<LendingError> for AppError {
    fn from(err: LendingError) -> Self {
        match err {
            LendingError::Invalid(msg) => Self::BadRequest(msg),
            LendingError::InvalidTransition { .. } => Self::BadRequest(err.to_string()),
            LendingError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            LendingError::LoanMath(math) => math.into(),
            LendingError::Repository(repo) => Self::Database(repo),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Auth(AuthError::Session(err))
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query-string extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Path-parameter extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a state-changing action.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("application 12".to_string());
        assert_eq!(err.to_string(), "Not found: application 12");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::BadRequest(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized(String::new()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden(String::new()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict(String::new()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(AppError::from(AuthError::InvalidCode).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::UserNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(AuthError::InvalidCodeFormat).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(AuthError::AccountDisabled).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(AuthError::UserAlreadyExists("email")).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_lending_error_mapping() {
        let err = AppError::from(LendingError::Invalid("amount is above the maximum".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "amount is above the maximum");

        let err = AppError::from(LendingError::NotFound("application"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "application not found");

        let err = AppError::from(LendingError::Repository(RepositoryError::Conflict(
            "application status changed concurrently".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_client_error_envelope() {
        let (status, json) =
            body_json(AppError::BadRequest("rejectionReason is required".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "rejectionReason is required");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_server_error_hides_internals() {
        let (status, json) = body_json(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        // Debug builds attach the underlying error for local troubleshooting
        assert_eq!(json.get("details").is_some(), cfg!(debug_assertions));
    }

    #[tokio::test]
    async fn test_unknown_user_message_is_generic() {
        let (_, json) = body_json(AppError::from(AuthError::UserNotFound)).await;
        assert_eq!(json["error"], "User not found");
    }
}
