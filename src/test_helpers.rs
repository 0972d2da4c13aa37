//! Shared unit-test utilities for exercising the client against a mock API.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::Timeouts;
use crate::test_support::config_for_endpoint;
use crate::vpc::VpcClient;

/// Bearer token issued by [`mock_api`].
pub const TEST_TOKEN: &str = "test-token";

/// Starts a mock server that issues IAM tokens and returns a client pointed
/// at it with millisecond polling.
pub async fn mock_api() -> (MockServer, VpcClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_TOKEN,
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let client = VpcClient::new(&config_for_endpoint(&server.uri()))
        .unwrap_or_else(|err| panic!("client should build: {err}"))
        .with_poll_interval(Duration::from_millis(5))
        .with_timeouts(Timeouts {
            create: Duration::from_secs(2),
            update: Duration::from_secs(2),
            delete: Duration::from_secs(2),
        });
    (server, client)
}

/// Response template for the standard API error envelope.
pub fn api_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "errors": [{ "code": code, "message": message }],
        "trace": "trace-id"
    }))
}
