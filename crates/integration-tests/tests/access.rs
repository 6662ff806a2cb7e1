//! Route gate behaviour with real sessions.

use reqwest::{StatusCode, header};

use ubuntu_lend_integration_tests::{TestContext, login};

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_anonymous_user_is_sent_to_login_with_callback() {
    let ctx = TestContext::new().await;

    let response = ctx
        .client()
        .get(ctx.url("/api/loans/next-payment"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/login?callbackUrl=%2Fapi%2Floans%2Fnext-payment"
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_customer_is_sent_away_from_admin() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user(false).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;

    for path in ["/admin", "/api/admin/users", "/api/admin/dashboard"] {
        let response = client.get(ctx.url(path)).send().await.expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.headers()[header::LOCATION], "/dashboard", "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_admin_reaches_admin_api() {
    let ctx = TestContext::new().await;
    let admin = ctx.create_user(true).await;
    let client = ctx.client();
    login(&ctx, &client, &admin).await;

    let response = client
        .get(ctx.url("/api/admin/users?limit=5"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_deleted_user_session_is_dropped() {
    let ctx = TestContext::new().await;
    let admin = ctx.create_user(true).await;
    let customer = ctx.create_user(false).await;

    let admin_client = ctx.client();
    login(&ctx, &admin_client, &admin).await;
    let customer_client = ctx.client();
    login(&ctx, &customer_client, &customer).await;

    let deleted = admin_client
        .delete(ctx.url(&format!("/api/admin/users/{}", customer.id)))
        .send()
        .await
        .expect("delete request");
    assert_eq!(deleted.status(), StatusCode::OK);

    let response = customer_client
        .get(ctx.url("/api/users/me"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/login?callbackUrl=%2Fapi%2Fusers%2Fme"
    );
}
