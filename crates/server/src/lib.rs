//! Ubuntu Lend server library.
//!
//! The HTTP API behind the customer site and the admin dashboard: phone and
//! OAuth sign-in, loan applications, the repayment ledger and admin
//! reporting. Exposed as a library so the binary, the CLI and the
//! integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum::http::{Request, Response};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::state::AppState;

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary. When `STATIC_DIR` is set, unknown
/// paths are served from it, falling back to its `index.html` so client-side
/// routes resolve.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let mut router = routes::routes(state.config().rate_limit);
    if let Some(dir) = state.config().static_dir.as_deref() {
        let index = Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::gate_middleware,
        ))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{StatusCode, header};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::tests::test_config;
    use crate::services::Notifier;

    /// A router whose pool never connects; only paths that stay off the
    /// database may be exercised.
    fn test_app() -> Router {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://ubuntu_lend@localhost/ubuntu_lend_unused")
            .unwrap();
        let session_layer = middleware::session::configure(MemoryStore::default(), &config);
        let state = AppState::with_notifier(config, pool, Notifier::disabled()).unwrap();
        app(state, session_layer)
    }

    fn peer(last_octet: u8) -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([203, 0, 113, last_octet], 51_000)))
    }

    async fn send(request: Request<Body>) -> axum::response::Response {
        test_app().oneshot(request).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_anonymous_admin_request_redirects_to_login() {
        let response = send(get("/api/admin/users?page=2")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?callbackUrl=%2Fapi%2Fadmin%2Fusers%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn test_anonymous_page_request_redirects_to_login() {
        let response = send(get("/dashboard")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?callbackUrl=%2Fdashboard"
        );
    }

    #[tokio::test]
    async fn test_malformed_otp_request_is_rejected_without_session() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/otp/verify")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(peer(9))
            .body(Body::from(r#"{"phone":"0712345678","countryCode":"254","code":"12ab"}"#))
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(header::SET_COOKIE));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Verification code must be 6 digits");
    }

    #[tokio::test]
    async fn test_invalid_json_body_uses_error_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(peer(10))
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_anonymous_session_is_null() {
        let response = send(get("/api/auth/session")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_unconfigured_oauth_provider_is_not_found() {
        let request = Request::builder()
            .uri("/api/auth/oauth/facebook/login")
            .extension(peer(11))
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn error_body(response: axum::response::Response) -> serde_json::Value {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_query_string_uses_error_envelope() {
        let response = send(get("/api/loan-types/3/quote?amount=lots&termMonths=12")).await;
        let json = error_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("amount"));
    }

    #[tokio::test]
    async fn test_bad_path_id_uses_error_envelope() {
        let response = send(get("/api/loan-types/abc/quote?amount=5000&termMonths=12")).await;
        let json = error_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_login_burst_is_rate_limited() {
        let app = test_app();
        let attempt = |spoofed: usize| {
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", format!("10.0.0.{spoofed}"))
                .extension(peer(12))
                .body(Body::from("{}"))
                .unwrap()
        };

        for i in 0..5 {
            let response = app.clone().oneshot(attempt(i)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        // A fresh forwarded address does not buy a fresh quota
        let response = app.clone().oneshot(attempt(99)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);

        // Other clients are unaffected
        let other = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(peer(13))
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(other).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
