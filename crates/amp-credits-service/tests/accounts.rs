//! Account lifecycle integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn provisioned_account_starts_empty() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.account_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["account_id"], harness.test_account_id.to_string());
    assert_eq!(body["balance"], 0);
    assert_eq!(body["is_locked"], false);
    assert_eq!(body["tier"], "free");
    assert_eq!(body["status"], "active");

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header("authorization", harness.account_auth_header())
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn provisioning_twice_is_a_conflict() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.account_auth_header())
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn archived_account_keeps_its_ledger_but_rejects_mutation() {
    let harness = TestHarness::new();
    harness.create_funded_account(100).await;

    harness
        .server
        .delete("/v1/accounts/me")
        .add_header("authorization", harness.account_auth_header())
        .await
        .assert_status_ok();

    // Spending is gone.
    let response = harness
        .server
        .post("/v1/actions/perform")
        .add_header("authorization", harness.account_auth_header())
        .json(&json!({ "action_type": "creator_search", "quantity": 1 }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);

    // So are credits, even service-issued ones.
    let response = harness
        .server
        .post("/v1/service/credits/grant")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "amount": 50,
            "reason": "Late grant"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);

    // The history remains readable.
    let response = harness
        .server
        .get("/v1/wallet/transactions")
        .add_header("authorization", harness.account_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}
