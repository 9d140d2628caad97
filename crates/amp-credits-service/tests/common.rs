//! Common test utilities for amp-credits integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;

use amp_credits_core::AccountId;
use amp_credits_service::{create_router, AppState, ServiceConfig};
use amp_credits_store::MemoryStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// A test account ID for authenticated requests.
    pub test_account_id: AccountId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
    /// The webhook signing secret.
    pub webhook_secret: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());

        let service_api_key = "test-service-key".to_string();
        let webhook_secret = "whsec_test".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(service_api_key.clone()),
            payment_webhook_secret: Some(webhook_secret.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(store, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_account_id = AccountId::generate();

        Self {
            server,
            test_account_id,
            service_api_key,
            webhook_secret,
        }
    }

    /// Get the authorization header for account authentication.
    pub fn account_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_account_id)
    }

    /// Get a different account's auth header (for testing isolation).
    pub fn other_account_auth_header() -> String {
        let other_account = AccountId::generate();
        format!("Bearer test-token:{other_account}")
    }

    /// Provision the test account.
    pub async fn create_account(&self) {
        self.server
            .post("/v1/accounts")
            .add_header("authorization", self.account_auth_header())
            .await
            .assert_status_ok();
    }

    /// Provision the test account and grant it a bonus balance.
    pub async fn create_funded_account(&self, balance: i64) {
        self.create_account().await;
        if balance > 0 {
            self.server
                .post("/v1/service/credits/grant")
                .add_header("x-api-key", &self.service_api_key)
                .json(&serde_json::json!({
                    "account_id": self.test_account_id.to_string(),
                    "amount": balance,
                    "reason": "Test funding"
                }))
                .await
                .assert_status_ok();
        }
    }

    /// Sign a webhook body with the harness's secret.
    pub fn sign_webhook(&self, body: &str) -> String {
        amp_credits_service::crypto::hmac_sha256_hex(&self.webhook_secret, body)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
