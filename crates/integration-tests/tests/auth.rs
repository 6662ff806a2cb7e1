//! Sign-in flows against a real database.
//!
//! Run with: `cargo test -p ubuntu-lend-integration-tests -- --ignored`

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::task::JoinSet;

use ubuntu_lend_core::PhoneNumber;
use ubuntu_lend_integration_tests::{PASSWORD, TestContext, json, login, unique_phone};
use ubuntu_lend_server::config::RateLimitConfig;

async fn verify_code(
    ctx: &TestContext,
    client: &Client,
    phone: &PhoneNumber,
    code: &str,
) -> StatusCode {
    client
        .post(ctx.url("/api/auth/otp/verify"))
        .json(&json!({ "phone": phone.as_str(), "countryCode": "", "code": code }))
        .send()
        .await
        .expect("verify request")
        .status()
}

// ============================================================================
// One-time codes
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_wrong_code_creates_no_session() {
    let ctx = TestContext::new().await;
    let client = ctx.client();
    let phone = unique_phone();
    ctx.issue_code(&phone, "482913").await;

    let response = client
        .post(ctx.url("/api/auth/otp/verify"))
        .json(&json!({
            "phone": phone.as_str(),
            "countryCode": "",
            "code": "482914",
        }))
        .send()
        .await
        .expect("verify request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session = json(
        client
            .get(ctx.url("/api/auth/session"))
            .send()
            .await
            .expect("session request"),
    )
    .await;
    assert!(session["data"].is_null());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_register_with_code_signs_in_once() {
    let ctx = TestContext::new().await;
    let client = ctx.client();
    let phone = unique_phone();
    ctx.issue_code(&phone, "031337").await;

    let email = format!("reg-{}@example.com", uuid::Uuid::new_v4().simple());
    let registration = json!({
        "firstName": " Wanjiru ",
        "lastName": "Kamau",
        "email": email,
        "countryCode": "",
        "phone": phone.as_str(),
        "code": "031337",
        "password": PASSWORD,
    });

    let response = client
        .post(ctx.url("/api/auth/register"))
        .json(&registration)
        .send()
        .await
        .expect("register request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json(response).await;
    assert_eq!(body["data"]["firstName"], "Wanjiru");
    assert_eq!(body["data"]["phoneVerified"], true);

    let session = json(
        client
            .get(ctx.url("/api/auth/session"))
            .send()
            .await
            .expect("session request"),
    )
    .await;
    assert_eq!(session["data"]["email"], email.as_str());

    // The code was consumed by registration
    let replay = ctx
        .client()
        .post(ctx.url("/api/auth/otp/verify"))
        .json(&json!({ "phone": phone.as_str(), "countryCode": "", "code": "031337" }))
        .send()
        .await
        .expect("verify request");
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_code_is_dead_after_five_wrong_attempts() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let phone = user.phone.clone().expect("user has a phone");
    let client = ctx.client();
    ctx.issue_code(&phone, "271828").await;

    for _ in 0..5 {
        assert_eq!(
            verify_code(&ctx, &client, &phone, "000000").await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(ctx.code_attempts(&phone).await, 5);

    // The right code no longer helps
    assert_eq!(
        verify_code(&ctx, &client, &phone, "271828").await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(ctx.code_attempts(&phone).await, 5);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_concurrent_wrong_guesses_respect_attempt_cap() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let phone = user.phone.clone().expect("user has a phone");
    ctx.issue_code(&phone, "111111").await;

    let mut guesses = JoinSet::new();
    for i in 0..40 {
        let client = ctx.client();
        let url = ctx.url("/api/auth/otp/verify");
        let body = json!({
            "phone": phone.as_str(),
            "countryCode": "",
            "code": format!("{:06}", 200_000 + i),
        });
        guesses.spawn(async move {
            client
                .post(url)
                .json(&body)
                .send()
                .await
                .expect("verify request")
                .status()
        });
    }
    while let Some(status) = guesses.join_next().await {
        assert_eq!(status.expect("task"), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(ctx.code_attempts(&phone).await, 5);
    assert_eq!(
        verify_code(&ctx, &ctx.client(), &phone, "111111").await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_expired_code_is_rejected() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let phone = user.phone.clone().expect("user has a phone");
    let client = ctx.client();
    ctx.issue_code_expiring(&phone, "161803", Utc::now() - Duration::seconds(1))
        .await;

    assert_eq!(
        verify_code(&ctx, &client, &phone, "161803").await,
        StatusCode::UNAUTHORIZED
    );
    let session = json(
        client
            .get(ctx.url("/api/auth/session"))
            .send()
            .await
            .expect("session request"),
    )
    .await;
    assert!(session["data"].is_null());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_valid_code_signs_in_existing_user() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let phone = user.phone.clone().expect("user has a phone");
    let client = ctx.client();
    ctx.issue_code(&phone, "577215").await;

    // A wrong guess first still leaves attempts to spare
    assert_eq!(
        verify_code(&ctx, &client, &phone, "577216").await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(verify_code(&ctx, &client, &phone, "577215").await, StatusCode::OK);

    let session = json(
        client
            .get(ctx.url("/api/auth/session"))
            .send()
            .await
            .expect("session request"),
    )
    .await;
    assert_eq!(session["data"]["id"], user.id.as_i32());
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_forwarded_header_does_not_bypass_login_limit() {
    let ctx = TestContext::with_rate_limit(RateLimitConfig {
        burst_size: 3,
        replenish_seconds: 60,
        trust_proxy_headers: false,
    })
    .await;
    let client = ctx.client();

    let mut statuses = Vec::new();
    for i in 0..6 {
        let response = client
            .post(ctx.url("/api/auth/login"))
            .header("x-forwarded-for", format!("198.51.100.{i}"))
            .json(&json!({ "email": "nobody@example.com", "password": "wrong-password-1" }))
            .send()
            .await
            .expect("login request");
        statuses.push(response.status());
    }

    let (allowed, limited) = statuses.split_at(3);
    assert!(allowed.iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert!(limited.iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

// ============================================================================
// Password login
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_login_then_logout() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let client = ctx.client();

    login(&ctx, &client, &user).await;
    let me = client
        .get(ctx.url("/api/users/me"))
        .send()
        .await
        .expect("me request");
    assert_eq!(me.status(), StatusCode::OK);

    let logout = client
        .post(ctx.url("/api/auth/logout"))
        .send()
        .await
        .expect("logout request");
    assert_eq!(logout.status(), StatusCode::OK);

    let me = client
        .get(ctx.url("/api/users/me"))
        .send()
        .await
        .expect("me request");
    assert_eq!(me.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;

    let response = ctx
        .client()
        .post(ctx.url("/api/auth/login"))
        .json(&json!({ "email": user.email, "password": "not-the-password-1" }))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json(response).await;
    assert_eq!(body["success"], false);
}
