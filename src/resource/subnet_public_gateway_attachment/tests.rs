use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::{AttachmentConfig, SubnetPublicGatewayAttachments};
use crate::resource::Resource;
use crate::test_helpers::mock_api;
use crate::vpc::VpcError;

fn config(gateway: &str) -> AttachmentConfig {
    AttachmentConfig {
        subnet: String::from("subnet-1"),
        public_gateway: gateway.to_owned(),
    }
}

#[tokio::test]
async fn attach_waits_for_subnet() {
    let (server, client) = mock_api().await;
    Mock::given(method("PUT"))
        .and(path("/subnets/subnet-1/public_gateway"))
        .and(body_json(json!({ "id": "gw-1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "gw-1",
            "name": "gw",
            "status": "available",
            "floating_ip": { "address": "169.48.0.7" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "updating" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "available" })))
        .mount(&server)
        .await;

    let state = SubnetPublicGatewayAttachments::new(client)
        .create(&config("gw-1"))
        .await
        .expect("attach");

    assert_eq!(state.id, "subnet-1");
    assert_eq!(state.public_gateway, "gw-1");
    assert_eq!(state.floating_ip.as_deref(), Some("169.48.0.7"));
}

#[tokio::test]
async fn update_with_same_gateway_is_a_no_op() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1/public_gateway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "gw-1" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let state = SubnetPublicGatewayAttachments::new(client)
        .update("subnet-1", &config("gw-1"))
        .await
        .expect("unchanged");

    assert_eq!(state.public_gateway, "gw-1");
}

#[tokio::test]
async fn update_cannot_change_subnet() {
    let (_server, client) = mock_api().await;

    let err = SubnetPublicGatewayAttachments::new(client)
        .update("subnet-9", &config("gw-1"))
        .await
        .expect_err("subnet change");

    assert!(matches!(err, VpcError::Validation(_)));
}

#[tokio::test]
async fn detach_of_unattached_subnet_succeeds() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1/public_gateway"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let attachments = SubnetPublicGatewayAttachments::new(client);

    attachments.delete("subnet-1").await.expect("nothing attached");
    assert_eq!(attachments.exists("subnet-1").await, Ok(false));
}

#[tokio::test]
async fn detach_waits_for_subnet() {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1/public_gateway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "gw-1" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/subnets/subnet-1/public_gateway"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subnets/subnet-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "available" })))
        .expect(1)
        .mount(&server)
        .await;

    SubnetPublicGatewayAttachments::new(client)
        .delete("subnet-1")
        .await
        .expect("detach");
}
