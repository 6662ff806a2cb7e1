//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database ping)
//!
//! # Catalog (public)
//! GET  /api/loan-types                      - Active loan types
//! GET  /api/loan-types/{id}/quote           - Repayment quote
//!
//! # Auth (rate limited, except session)
//! POST /api/auth/otp/send                   - Send a one-time code
//! POST /api/auth/otp/verify                 - Sign in with a one-time code
//! POST /api/auth/register                   - Phone registration
//! POST /api/auth/login                      - Email/password sign-in
//! POST /api/auth/logout                     - Sign out
//! GET  /api/auth/session                    - Current user or null
//! GET  /api/auth/oauth/{provider}/login     - Redirect to provider
//! GET  /api/auth/oauth/{provider}/callback  - Provider redirect target
//! GET  /api/auth/oauth/pending/{token}      - Parked first-time profile
//! POST /api/auth/oauth/confirm              - Create account from parked profile
//!
//! # Signed-in user
//! GET   /api/users/me                       - Own profile
//! PATCH /api/users/me                       - Update own profile
//! POST  /api/applications                   - Submit an application
//! GET   /api/applications                   - Own applications
//! GET   /api/applications/{id}              - One own application
//! GET   /api/loans/interest-rate            - Current loan's rate
//! GET   /api/loans/term                     - Current loan's term
//! GET   /api/loans/next-payment             - Current loan's next installment
//! GET   /api/loans/transactions             - Own ledger entries
//!
//! # Admin (see `admin::routes`)
//! /api/admin/users, /api/admin/applications, /api/admin/transactions,
//! /api/admin/dashboard, /api/admin/loan-types
//! ```

pub mod admin;
pub mod applications;
pub mod auth;
pub mod health;
pub mod loan_types;
pub mod loans;
pub mod oauth;
pub mod params;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

use crate::config::RateLimitConfig;
use crate::middleware::{auth_rate_limiter, rate_limit_envelope};
use crate::state::AppState;

/// Credential and OAuth routes, rate limited per client IP.
pub fn auth_routes(limits: RateLimitConfig) -> Router<AppState> {
    let limited = Router::new()
        .route("/otp/send", post(auth::send_otp))
        .route("/otp/verify", post(auth::verify_otp))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/oauth/{provider}/login", get(oauth::login))
        .route("/oauth/{provider}/callback", get(oauth::callback))
        .route("/oauth/pending/{token}", get(oauth::pending))
        .route("/oauth/confirm", post(oauth::confirm))
        .layer(auth_rate_limiter(limits))
        .layer(axum::middleware::map_response(rate_limit_envelope));

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::current_session))
        .merge(limited)
}

/// Create all API routes.
pub fn routes(limits: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/loan-types", get(loan_types::list))
        .route("/api/loan-types/{id}/quote", get(loan_types::quote))
        .nest("/api/auth", auth_routes(limits))
        .route("/api/users/me", get(users::me).patch(users::update_me))
        .route(
            "/api/applications",
            get(applications::list_own).post(applications::submit),
        )
        .route("/api/applications/{id}", get(applications::show_own))
        .route("/api/loans/interest-rate", get(loans::interest_rate))
        .route("/api/loans/term", get(loans::term))
        .route("/api/loans/next-payment", get(loans::next_payment))
        .route("/api/loans/transactions", get(loans::transactions))
        .nest("/api/admin", admin::routes())
}
