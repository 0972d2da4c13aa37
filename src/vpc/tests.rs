//! Client tests against a mock VPC API.

use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use super::{Etag, VpcClient, VpcError};
use crate::test_helpers::{TEST_TOKEN, api_error, mock_api};
use crate::test_support::config_for_endpoint;

#[tokio::test]
async fn get_sends_version_generation_and_token() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/r006-1"))
        .and(query_param("version", crate::config::DEFAULT_API_VERSION))
        .and(query_param("generation", "2"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r006-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client
        .get_json("/vpn_servers/r006-1")
        .await
        .expect("get should succeed");

    assert_eq!(body, json!({ "id": "r006-1" }));
}

#[tokio::test]
async fn token_is_cached_between_requests() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/floating_ips/fip-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "fip-1" })))
        .mount(&server)
        .await;

    for _ in 0..3 {
        let _: Value = client.get_json("/floating_ips/fip-1").await.expect("get");
    }

    let requests = server.received_requests().await.expect("recording enabled");
    let token_calls = requests
        .iter()
        .filter(|request| request.url.path() == "/identity/token")
        .count();
    assert_eq!(token_calls, 1);
}

#[tokio::test]
async fn not_found_maps_to_not_found_error() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/public_gateways/gw-9"))
        .respond_with(api_error(404, "not_found", "Public gateway not found"))
        .mount(&server)
        .await;

    let err = client
        .get_json::<Value>("/public_gateways/gw-9")
        .await
        .expect_err("404 should fail");

    assert_eq!(
        err,
        VpcError::NotFound {
            resource: String::from("public_gateways"),
            id: String::from("gw-9"),
        }
    );
}

#[tokio::test]
async fn api_errors_carry_first_envelope_message() {
    let (server, client) = mock_api().await;
    Mock::given(method("POST"))
        .and(path("/floating_ips"))
        .respond_with(api_error(400, "validation_required_field_missing", "zone is required"))
        .mount(&server)
        .await;

    let err = client
        .post_json::<_, Value>("/floating_ips", &json!({ "name": "ip" }))
        .await
        .expect_err("400 should fail");

    assert_eq!(
        err,
        VpcError::Api {
            status: 400,
            message: String::from("validation_required_field_missing: zone is required"),
        }
    );
}

#[tokio::test]
async fn etag_is_returned_and_sent_back_as_if_match() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/backup_policies/bp-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "W/\"abc\"")
                .set_body_json(json!({ "id": "bp-1" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/backup_policies/bp-1"))
        .and(header("if-match", "W/\"abc\""))
        .and(header("content-type", "application/merge-patch+json"))
        .and(body_json(json!({ "name": "renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "bp-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, etag): (Value, Option<Etag>) = client
        .get_json_with_etag("/backup_policies/bp-1")
        .await
        .expect("get");
    let etag = etag.expect("etag header present");
    assert_eq!(etag.as_str(), "W/\"abc\"");

    let _: Value = client
        .patch_json("/backup_policies/bp-1", &json!({ "name": "renamed" }), Some(&etag))
        .await
        .expect("patch");
}

#[tokio::test]
async fn list_all_follows_next_links() {
    let (server, client) = mock_api().await;
    let next = format!("{}/floating_ips?limit=50&start=page-2", server.uri());
    Mock::given(method("GET"))
        .and(path("/floating_ips"))
        .and(query_param("start", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ips": [{ "id": "fip-3" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/floating_ips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ips": [{ "id": "fip-1" }, { "id": "fip-2" }],
            "next": { "href": next }
        })))
        .mount(&server)
        .await;

    let items: Vec<Value> = client
        .list_all("/floating_ips", "floating_ips", &[])
        .await
        .expect("list");

    let ids: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_str))
        .collect();
    assert_eq!(ids, ["fip-1", "fip-2", "fip-3"]);
}

#[tokio::test]
async fn list_all_stops_when_next_link_repeats() {
    let (server, client) = mock_api().await;
    let next = format!("{}/floating_ips?limit=50&start=page-2", server.uri());
    Mock::given(method("GET"))
        .and(path("/floating_ips"))
        .and(query_param("start", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ips": [{ "id": "fip-2" }],
            "next": { "href": next }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/floating_ips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ips": [{ "id": "fip-1" }],
            "next": { "href": next }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items: Vec<Value> = client
        .list_all("/floating_ips", "floating_ips", &[])
        .await
        .expect("list");

    let ids: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_str))
        .collect();
    assert_eq!(ids, ["fip-1", "fip-2"]);
}

#[tokio::test]
async fn oversized_token_lifetime_is_accepted() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_TOKEN,
            "expires_in": u64::MAX,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/r006-1"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "r006-1" })))
        .expect(2)
        .mount(&server)
        .await;
    let client = VpcClient::new(&config_for_endpoint(&server.uri())).expect("client");

    for _ in 0..2 {
        let body: Value = client.get_json("/vpn_servers/r006-1").await.expect("get");
        assert_eq!(body, json!({ "id": "r006-1" }));
    }
}

#[tokio::test]
async fn rejected_api_key_is_an_auth_error() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad key"))
        .mount(&server)
        .await;
    let client = VpcClient::new(&config_for_endpoint(&server.uri())).expect("client");

    let err = client
        .get_json::<Value>("/vpn_servers")
        .await
        .expect_err("auth should fail");

    assert!(matches!(err, VpcError::Auth { .. }), "unexpected: {err}");
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = config_for_endpoint("http://127.0.0.1:1");
    config.generation = 3;

    let err = VpcClient::new(&config).expect_err("generation 3 is invalid");

    assert!(matches!(err, VpcError::Config(ref message) if message.contains("generation")));
}
