//! Common test utilities for ledger-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use ledger_core::UserId;
use ledger_service::{create_router, AppState, ServiceConfig};
use ledger_store::RocksStore;

/// Test harness containing everything needed for integration tests.
///
/// With no rate source configured the oracle serves the fallback rate of
/// 90.0, so a 500-unit purchase of the "gpt-4o" model (0.0024 base cost)
/// prices at 0.216 per token and grants floor(450 / 0.216) = 2083 tokens.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for ledger requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after applying `adjust` to the default test config.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let service_api_key = "test-service-key".to_string();

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(service_api_key.clone()),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(Arc::new(store), config).expect("Failed to build state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    /// Grant tokens to the test user and return the response body.
    ///
    /// `amount` 500 with model "gpt-4o" grants 2083 tokens at the fallback
    /// rate.
    pub async fn grant(&self, payment_id: &str, amount: i64) -> serde_json::Value {
        let response = self
            .server
            .post("/v1/grants")
            .add_header("x-api-key", self.service_api_key.as_str())
            .json(&json!({
                "external_payment_id": payment_id,
                "user_id": self.test_user_id.to_string(),
                "amount": amount,
                "currency": "RUB",
                "model_id": "gpt-4o",
            }))
            .await;

        response.assert_status_ok();
        response.json()
    }

    /// Consume tokens for the test user, returning the raw response.
    pub async fn consume(&self, amount: i64) -> axum_test::TestResponse {
        self.server
            .post("/v1/usage")
            .add_header("x-api-key", self.service_api_key.as_str())
            .json(&json!({
                "user_id": self.test_user_id.to_string(),
                "amount": amount,
            }))
            .await
    }

    /// Read the test user's balance.
    pub async fn balance(&self) -> i64 {
        let response = self
            .server
            .get(&format!("/v1/balance/{}", self.test_user_id))
            .add_header("x-api-key", self.service_api_key.as_str())
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["balance"].as_i64().expect("balance field")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
