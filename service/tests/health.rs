//! Health endpoint integration tests.

mod common;

use common::TestHarness;

#[tokio::test]
async fn health_is_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ledger-service");
}

#[tokio::test]
async fn ledger_routes_require_auth() {
    let harness = TestHarness::new();

    let paths = [
        format!("/v1/balance/{}", harness.test_user_id),
        format!("/v1/lots/{}", harness.test_user_id),
        format!("/v1/usage/{}", harness.test_user_id),
        "/v1/rates/latest".to_string(),
    ];

    for path in paths {
        let response = harness.server.get(&path).await;
        response.assert_status_unauthorized();
    }
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/balance/{}", harness.test_user_id))
        .add_header("x-api-key", "not-the-key")
        .await;

    response.assert_status_unauthorized();
}
