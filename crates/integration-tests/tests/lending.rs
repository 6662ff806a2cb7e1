//! Application lifecycle and repayment ledger.

use std::str::FromStr;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use ubuntu_lend_core::LoanTypeId;
use ubuntu_lend_integration_tests::{TestContext, json, login};

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal string")).expect("valid decimal")
}

async fn submit(ctx: &TestContext, client: &Client, loan_type_id: LoanTypeId, amount: u32) -> Value {
    let response = client
        .post(ctx.url("/api/applications"))
        .json(&json!({
            "loanTypeId": loan_type_id,
            "amount": amount.to_string(),
            "termMonths": 12,
            "purpose": "School fees",
            "employmentStatus": "employed",
            "employerName": "Safari Logistics",
            "monthlyIncome": "85000",
            "bankName": "Equity Bank",
            "bankAccountNumber": "0123456789",
        }))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), StatusCode::OK);
    json(response).await["data"].clone()
}

async fn set_status(ctx: &TestContext, admin: &Client, id: &Value, body: Value) -> reqwest::Response {
    admin
        .patch(ctx.url(&format!("/api/admin/applications/{id}/status")))
        .json(&body)
        .send()
        .await
        .expect("status request")
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_submitted_application_is_pending_at_product_rate() {
    let ctx = TestContext::new().await;
    let loan_type_id = ctx.create_loan_type().await;
    let user = ctx.create_user(false).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;

    let application = submit(&ctx, &client, loan_type_id, 20_000).await;
    assert_eq!(application["status"], "pending");
    assert_eq!(decimal(&application["interestRate"]), Decimal::from(12));
    assert_eq!(application["userId"], json!(user.id));

    // Read the stored row back
    let id = &application["id"];
    let response = client
        .get(ctx.url(&format!("/api/applications/{id}")))
        .send()
        .await
        .expect("show request");
    assert_eq!(response.status(), StatusCode::OK);
    let stored = json(response).await["data"].clone();
    assert_eq!(stored["id"], *id);
    assert_eq!(stored["loanTypeId"], json!(loan_type_id));
    assert_eq!(stored["status"], "pending");
    assert_eq!(decimal(&stored["amount"]), Decimal::from(20_000));
    assert_eq!(stored["termMonths"], 12);
    assert_eq!(decimal(&stored["interestRate"]), Decimal::from(12));
    assert_eq!(stored["purpose"], "School fees");
    assert_eq!(stored["employmentStatus"], "employed");
    assert_eq!(stored["employerName"], "Safari Logistics");
    assert_eq!(decimal(&stored["monthlyIncome"]), Decimal::from(85_000));
    assert_eq!(stored["bankName"], "Equity Bank");
    assert_eq!(stored["bankAccountNumber"], "0123456789");
    assert!(stored["rejectionReason"].is_null());
    assert!(stored["disbursedAmount"].is_null());

    // Someone else's application does not exist for this user
    let stranger = ctx.create_user(false).await;
    let other = ctx.client();
    login(&ctx, &other, &stranger).await;
    let response = other
        .get(ctx.url(&format!("/api/applications/{id}")))
        .send()
        .await
        .expect("show request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(ctx.url("/api/applications/latest"))
        .send()
        .await
        .expect("show request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["success"], false);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_amount_outside_product_bounds_is_rejected() {
    let ctx = TestContext::new().await;
    let loan_type_id = ctx.create_loan_type().await;
    let user = ctx.create_user(false).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;

    let response = client
        .post(ctx.url("/api/applications"))
        .json(&json!({
            "loanTypeId": loan_type_id,
            "amount": "999999",
            "termMonths": 12,
            "purpose": "Land",
            "employmentStatus": "self_employed",
            "monthlyIncome": "40000",
            "bankName": "KCB",
            "bankAccountNumber": "99887766",
        }))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_rejection_requires_reason() {
    let ctx = TestContext::new().await;
    let loan_type_id = ctx.create_loan_type().await;
    let user = ctx.create_user(false).await;
    let admin = ctx.create_user(true).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;
    let admin_client = ctx.client();
    login(&ctx, &admin_client, &admin).await;

    let application = submit(&ctx, &client, loan_type_id, 5_000).await;
    let id = &application["id"];

    let response = set_status(&ctx, &admin_client, id, json!({ "status": "rejected" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = set_status(
        &ctx,
        &admin_client,
        id,
        json!({ "status": "rejected", "rejectionReason": "Insufficient income history" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["reviewedBy"], json!(admin.id));

    // Rejected is terminal
    let response = set_status(&ctx, &admin_client, id, json!({ "status": "approved" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_disbursed_loan_tracks_repayments() {
    let ctx = TestContext::new().await;
    let loan_type_id = ctx.create_loan_type().await;
    let user = ctx.create_user(false).await;
    let admin = ctx.create_user(true).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;
    let admin_client = ctx.client();
    login(&ctx, &admin_client, &admin).await;

    let application = submit(&ctx, &client, loan_type_id, 12_000).await;
    let id = &application["id"];

    let approved = set_status(&ctx, &admin_client, id, json!({ "status": "approved" })).await;
    assert_eq!(approved.status(), StatusCode::OK);
    let disbursed = set_status(
        &ctx,
        &admin_client,
        id,
        json!({ "status": "disbursed", "disbursedAmount": "12000" }),
    )
    .await;
    assert_eq!(disbursed.status(), StatusCode::OK);

    let before = json(
        client
            .get(ctx.url("/api/loans/next-payment"))
            .send()
            .await
            .expect("next payment request"),
    )
    .await;
    let monthly = decimal(&before["data"]["monthlyPayment"]);
    let balance_before = decimal(&before["data"]["outstandingBalance"]);
    assert!(monthly > Decimal::ZERO);
    assert!(before["data"]["dueDate"].is_string());

    let recorded = admin_client
        .post(ctx.url("/api/admin/transactions"))
        .json(&json!({
            "applicationId": id,
            "kind": "repayment",
            "amount": monthly.to_string(),
        }))
        .send()
        .await
        .expect("transaction request");
    assert_eq!(recorded.status(), StatusCode::CREATED);

    let term = json(
        client
            .get(ctx.url("/api/loans/term"))
            .send()
            .await
            .expect("term request"),
    )
    .await;
    assert_eq!(term["data"]["paymentsMade"], 1);
    assert_eq!(term["data"]["paymentsRemaining"], 11);

    let after = json(
        client
            .get(ctx.url("/api/loans/next-payment"))
            .send()
            .await
            .expect("next payment request"),
    )
    .await;
    assert_eq!(
        decimal(&after["data"]["outstandingBalance"]),
        balance_before - monthly
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_own_application_pagination() {
    let ctx = TestContext::new().await;
    let loan_type_id = ctx.create_loan_type().await;
    let user = ctx.create_user(false).await;
    let client = ctx.client();
    login(&ctx, &client, &user).await;

    for amount in [2_000, 3_000, 4_000] {
        submit(&ctx, &client, loan_type_id, amount).await;
    }

    let first = json(
        client
            .get(ctx.url("/api/applications?page=1&limit=2"))
            .send()
            .await
            .expect("list request"),
    )
    .await;
    assert_eq!(first["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(first["pagination"]["totalCount"], 3);
    assert_eq!(first["pagination"]["totalPages"], 2);

    let second = json(
        client
            .get(ctx.url("/api/applications?page=2&limit=2"))
            .send()
            .await
            .expect("list request"),
    )
    .await;
    assert_eq!(second["data"].as_array().map(Vec::len), Some(1));

    let malformed = client
        .get(ctx.url("/api/applications?page=abc"))
        .send()
        .await
        .expect("list request");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}
