//! Tests for VPN server validation and lifecycle waits.

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::{ClientAuthentication, VpnServerConfig, VpnServers};
use crate::resource::Resource;
use crate::test_helpers::mock_api;
use crate::vpc::VpcError;

#[fixture]
fn config() -> VpnServerConfig {
    VpnServerConfig {
        certificate_crn: String::from("crn:v1:cert"),
        client_authentication: vec![ClientAuthentication {
            method: String::from("certificate"),
            client_ca_crn: Some(String::from("crn:v1:ca")),
            identity_provider: None,
        }],
        client_ip_pool: String::from("172.16.0.0/16"),
        name: Some(String::from("vpn-1")),
        subnets: vec![String::from("subnet-1")],
        ..VpnServerConfig::default()
    }
}

fn server_body(state: &str) -> Value {
    json!({
        "id": "vpn-1",
        "name": "vpn-1",
        "lifecycle_state": state,
        "certificate": { "crn": "crn:v1:cert" },
        "client_authentication": [
            { "method": "certificate", "client_ca": { "crn": "crn:v1:ca" } }
        ],
        "client_ip_pool": "172.16.0.0/16",
        "subnets": [{ "id": "subnet-1" }],
        "private_ips": [{ "address": "10.0.0.4" }]
    })
}

#[rstest]
fn valid_config_passes(config: VpnServerConfig) {
    assert_eq!(config.validate(), Ok(()));
}

#[rstest]
#[case::certificate_without_ca("certificate", None, None, "client_ca_crn")]
#[case::username_without_provider("username", Some("crn:v1:ca"), None, "identity_provider")]
#[case::unknown_method("token", None, Some("iam"), "certificate or username")]
fn authentication_entries_are_checked(
    config: VpnServerConfig,
    #[case] auth_method: &str,
    #[case] client_ca_crn: Option<&str>,
    #[case] identity_provider: Option<&str>,
    #[case] mentions: &str,
) {
    let invalid = VpnServerConfig {
        client_authentication: vec![ClientAuthentication {
            method: auth_method.to_owned(),
            client_ca_crn: client_ca_crn.map(str::to_owned),
            identity_provider: identity_provider.map(str::to_owned),
        }],
        ..config
    };

    let err = invalid.validate().expect_err("invalid authentication");
    assert!(err.to_string().contains(mentions), "unexpected: {err}");
}

#[rstest]
#[case::address_only("172.16.0.1")]
#[case::garbage("not-a-pool")]
fn client_pool_must_be_cidr(config: VpnServerConfig, #[case] pool: &str) {
    let invalid = VpnServerConfig {
        client_ip_pool: pool.to_owned(),
        ..config
    };

    assert!(matches!(invalid.validate(), Err(VpcError::Validation(_))));
}

#[rstest]
fn subnets_are_required(config: VpnServerConfig) {
    let invalid = VpnServerConfig {
        subnets: Vec::new(),
        ..config
    };

    assert!(invalid.validate().is_err());
}

#[rstest]
#[tokio::test]
async fn create_waits_for_stable(config: VpnServerConfig) {
    let (server, client) = mock_api().await;
    Mock::given(method("POST"))
        .and(path("/vpn_servers"))
        .and(body_partial_json(json!({
            "certificate": { "crn": "crn:v1:cert" },
            "client_authentication": [
                { "method": "certificate", "client_ca": { "crn": "crn:v1:ca" } }
            ],
            "subnets": [{ "id": "subnet-1" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(server_body("pending")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("pending")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("stable")))
        .mount(&server)
        .await;

    let state = VpnServers::new(client).create(&config).await.expect("create");

    assert_eq!(state.lifecycle_state, "stable");
    assert_eq!(state.private_ips, vec![String::from("10.0.0.4")]);
    assert_eq!(
        state.client_authentication[0].client_ca_crn.as_deref(),
        Some("crn:v1:ca")
    );
}

#[rstest]
#[tokio::test]
async fn create_surfaces_failed_state(config: VpnServerConfig) {
    let (server, client) = mock_api().await;
    Mock::given(method("POST"))
        .and(path("/vpn_servers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(server_body("pending")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("failed")))
        .mount(&server)
        .await;

    let err = VpnServers::new(client)
        .create(&config)
        .await
        .expect_err("failed server");

    assert!(matches!(err, VpcError::Failed { ref state, .. } if state == "failed"));
}

#[rstest]
#[tokio::test]
async fn update_sends_if_match(config: VpnServerConfig) {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "W/\"v1\"")
                .set_body_json(server_body("stable")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/vpn_servers/vpn-1"))
        .and(header("if-match", "W/\"v1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("updating")))
        .expect(1)
        .mount(&server)
        .await;

    let state = VpnServers::new(client)
        .update("vpn-1", &config)
        .await
        .expect("update");

    assert_eq!(state.lifecycle_state, "stable");
}

#[tokio::test]
async fn delete_waits_until_gone() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "W/\"v2\"")
                .set_body_json(server_body("stable")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/vpn_servers/vpn-1"))
        .and(header("if-match", "W/\"v2\""))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_body("deleting")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    VpnServers::new(client)
        .delete("vpn-1")
        .await
        .expect("delete");
}

#[tokio::test]
async fn delete_of_missing_server_is_a_no_op() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/vpn_servers/vpn-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let servers = VpnServers::new(client);

    servers.delete("vpn-1").await.expect("already absent");
    assert_eq!(servers.exists("vpn-1").await, Ok(false));
}
