//! Admin API. Every route here sits behind the admin gate.

pub mod applications;
pub mod dashboard;
pub mod loan_types;
pub mod transactions;
pub mod users;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Routes mounted under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list))
        .route(
            "/users/{id}",
            get(users::show).patch(users::update).delete(users::delete),
        )
        .route("/applications", get(applications::list))
        .route("/applications/{id}", get(applications::show))
        .route(
            "/applications/{id}/status",
            patch(applications::update_status),
        )
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/dashboard", get(dashboard::show))
        .route("/dashboard/refresh", post(dashboard::refresh))
        .route("/loan-types", get(loan_types::list).post(loan_types::create))
        .route("/loan-types/{id}", patch(loan_types::update))
}
