//! Mock VPC API shared by the lifecycle integration tests.

use std::time::Duration;

use serde_json::json;
use vpcform::{Timeouts, VpcClient, test_support::config_for_endpoint};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::test_constants::TEST_TOKEN;

/// Starts a server that issues IAM tokens and a client pointed at it.
pub async fn start_api() -> (MockServer, VpcClient) {
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
