//! Top-up package and payment webhook integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn packages_are_priced_for_the_caller_tier() {
    let harness = TestHarness::new();
    harness.create_account().await;

    // Free tier: no discount.
    let response = harness
        .server
        .get("/v1/topup/packages")
        .add_header("authorization", harness.account_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["discount_percentage"], 0);
    let starter = &body["packages"][0];
    assert_eq!(starter["package_type"], "starter");
    assert_eq!(starter["credits"], 500);
    assert_eq!(starter["discounted_price_cents"], starter["base_price_cents"]);

    // Premium tier: 20% off.
    harness
        .server
        .post("/v1/subscription/upgrade")
        .add_header("authorization", harness.account_auth_header())
        .json(&json!({ "tier": "premium" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/topup/packages")
        .add_header("authorization", harness.account_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["discount_percentage"], 20);
    let starter = &body["packages"][0];
    let base = starter["base_price_cents"].as_i64().unwrap();
    let discounted = starter["discounted_price_cents"].as_i64().unwrap();
    assert!(discounted < base);
}

fn topup_body(harness: &TestHarness, reference: &str) -> String {
    json!({
        "type": "topup.confirmed",
        "account_id": harness.test_account_id.to_string(),
        "package_type": "starter",
        "external_reference": reference
    })
    .to_string()
}

#[tokio::test]
async fn topup_confirmation_credits_the_wallet() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let body = topup_body(&harness, "pay_001");
    let signature = harness.sign_webhook(&body);

    harness
        .server
        .post("/webhooks/payment")
        .add_header("x-amp-signature", signature)
        .text(body)
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.account_auth_header())
        .await;
    let wallet: serde_json::Value = response.json();
    assert_eq!(wallet["balance"], 500);
    assert_eq!(wallet["lifetime_purchased_credits"], 500);
}

#[tokio::test]
async fn replayed_topup_confirmation_credits_once() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let body = topup_body(&harness, "pay_002");
    let signature = harness.sign_webhook(&body);

    for _ in 0..3 {
        harness
            .server
            .post("/webhooks/payment")
            .add_header("x-amp-signature", signature.clone())
            .text(body.clone())
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.account_auth_header())
        .await;
    let wallet: serde_json::Value = response.json();
    assert_eq!(wallet["balance"], 500);

    // Exactly one purchased entry.
    let response = harness
        .server
        .get("/v1/wallet/transactions")
        .add_header("authorization", harness.account_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["transaction_type"], "purchased");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let body = topup_body(&harness, "pay_003");

    let response = harness
        .server
        .post("/webhooks/payment")
        .add_header("x-amp-signature", "deadbeef")
        .text(body)
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let response = harness
        .server
        .get("/v1/wallet")
        .add_header("authorization", harness.account_auth_header())
        .await;
    let wallet: serde_json::Value = response.json();
    assert_eq!(wallet["balance"], 0);
}

#[tokio::test]
async fn webhook_without_signature_is_rejected_when_secret_configured() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/webhooks/payment")
        .text(topup_body(&harness, "pay_004"))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}
