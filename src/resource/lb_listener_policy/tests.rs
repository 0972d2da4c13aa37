//! Tests for listener policy targets and load balancer coordination.

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::{
    ListenerPolicies, ListenerPolicyConfig, PolicyAction, PolicyTarget, lock_key,
};
use crate::resource::Resource;
use crate::test_helpers::mock_api;
use crate::vpc::VpcError;

#[fixture]
fn forward() -> ListenerPolicyConfig {
    ListenerPolicyConfig {
        lb: String::from("lb-1"),
        listener: String::from("lst-1"),
        action: PolicyAction::Forward,
        priority: 2,
        name: Some(String::from("to-pool")),
        rules: Vec::new(),
        target_id: Some(String::from("lb-1/pool-1")),
        target_http_status_code: None,
        target_url: None,
        target_https_redirect_listener: None,
        target_https_redirect_status_code: None,
        target_https_redirect_uri: None,
    }
}

fn policy_body(status: &str) -> Value {
    json!({
        "id": "pol-1",
        "name": "to-pool",
        "action": "forward",
        "priority": 2,
        "provisioning_status": status,
        "target": { "id": "pool-1", "name": "web" }
    })
}

async fn mount_active_load_balancer(server: &wiremock::MockServer) {
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "provisioning_status": "active" })),
        )
        .mount(server)
        .await;
}

#[rstest]
fn forward_reduces_pool_id(forward: ListenerPolicyConfig) {
    assert_eq!(
        forward.target(),
        Ok(Some(PolicyTarget::Pool {
            id: String::from("pool-1")
        }))
    );
}

#[rstest]
fn forward_requires_target_id(forward: ListenerPolicyConfig) {
    let config = ListenerPolicyConfig {
        target_id: None,
        ..forward
    };

    let err = config.target().expect_err("missing target");
    assert!(err.to_string().contains("target_id"), "unexpected: {err}");
}

#[rstest]
#[case::missing_code(None, Some("https://example.com"), "target_http_status_code")]
#[case::missing_url(Some(301), None, "target_url")]
fn redirect_requires_code_and_url(
    forward: ListenerPolicyConfig,
    #[case] code: Option<u16>,
    #[case] url: Option<&str>,
    #[case] mentions: &str,
) {
    let config = ListenerPolicyConfig {
        action: PolicyAction::Redirect,
        target_id: None,
        target_http_status_code: code,
        target_url: url.map(str::to_owned),
        ..forward
    };

    let err = config.target().expect_err("incomplete redirect");
    assert!(err.to_string().contains(mentions), "unexpected: {err}");
}

#[rstest]
fn https_redirect_uri_is_optional(forward: ListenerPolicyConfig) {
    let config = ListenerPolicyConfig {
        action: PolicyAction::HttpsRedirect,
        target_id: None,
        target_https_redirect_listener: Some(String::from("lb-1/lst-443")),
        target_https_redirect_status_code: Some(302),
        ..forward
    };

    assert_eq!(
        config.target(),
        Ok(Some(PolicyTarget::HttpsRedirect {
            http_status_code: 302,
            listener: String::from("lst-443"),
            uri: None,
        }))
    );
}

#[rstest]
#[case::zero(0)]
#[case::eleven(11)]
fn priority_is_bounded(forward: ListenerPolicyConfig, #[case] priority: u8) {
    let config = ListenerPolicyConfig { priority, ..forward };

    assert!(matches!(config.target(), Err(VpcError::Validation(_))));
}

#[rstest]
fn reject_has_no_target(forward: ListenerPolicyConfig) {
    let config = ListenerPolicyConfig {
        action: PolicyAction::Reject,
        target_id: None,
        ..forward
    };

    assert_eq!(config.target(), Ok(None));
}

#[rstest]
#[case::pool(PolicyAction::Forward, Some(json!({ "id": "pool-1" })), Some(PolicyTarget::Pool { id: String::from("pool-1") }))]
#[case::redirect(
    PolicyAction::Redirect,
    Some(json!({ "http_status_code": 301, "url": "https://example.com" })),
    Some(PolicyTarget::RedirectUrl { http_status_code: 301, url: String::from("https://example.com") })
)]
#[case::https(
    PolicyAction::HttpsRedirect,
    Some(json!({ "http_status_code": 308, "listener": { "id": "lst-443" }, "uri": "/secure" })),
    Some(PolicyTarget::HttpsRedirect { http_status_code: 308, listener: String::from("lst-443"), uri: Some(String::from("/secure")) })
)]
#[case::reject(PolicyAction::Reject, None, None)]
fn response_target_follows_action(
    #[case] action: PolicyAction,
    #[case] target: Option<Value>,
    #[case] expected: Option<PolicyTarget>,
) {
    assert_eq!(
        PolicyTarget::from_response(action, target.as_ref()),
        Ok(expected)
    );
}

#[test]
fn response_target_shape_mismatch_is_a_decode_error() {
    let target = json!({ "id": "pool-1" });

    let err = PolicyTarget::from_response(PolicyAction::Redirect, Some(&target))
        .expect_err("pool shape for redirect");

    assert!(matches!(err, VpcError::Decode { .. }));
}

#[test]
fn lock_key_names_the_load_balancer() {
    assert_eq!(lock_key("lb-1"), "load_balancer_key_lb-1");
}

#[rstest]
#[tokio::test]
async fn create_waits_for_load_balancer_then_policy(forward: ListenerPolicyConfig) {
    let (server, client) = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provisioning_status": "update_pending"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_active_load_balancer(&server).await;
    Mock::given(method("POST"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies"))
        .and(body_json(json!({
            "action": "forward",
            "priority": 2,
            "name": "to-pool",
            "target": { "id": "pool-1" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(policy_body("create_pending")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_body("active")))
        .mount(&server)
        .await;

    let state = ListenerPolicies::new(client)
        .create(&forward)
        .await
        .expect("create");

    assert_eq!(state.id, "lb-1/lst-1/pol-1");
    assert_eq!(state.target_id.as_deref(), Some("pool-1"));
    assert_eq!(state.provisioning_status, "active");
}

#[rstest]
#[tokio::test]
async fn update_patches_priority_and_target(forward: ListenerPolicyConfig) {
    let (server, client) = mock_api().await;
    mount_active_load_balancer(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .and(body_json(json!({
            "priority": 2,
            "name": "to-pool",
            "target": { "id": "pool-1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_body("update_pending")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_body("active")))
        .mount(&server)
        .await;

    let state = ListenerPolicies::new(client)
        .update("lb-1/lst-1/pol-1", &forward)
        .await
        .expect("update");

    assert_eq!(state.priority, 2);
}

#[rstest]
#[tokio::test]
async fn update_cannot_move_listener(forward: ListenerPolicyConfig) {
    let (_server, client) = mock_api().await;

    let err = ListenerPolicies::new(client)
        .update("lb-1/lst-9/pol-1", &forward)
        .await
        .expect_err("listener change");

    assert!(matches!(err, VpcError::Validation(_)));
}

#[tokio::test]
async fn delete_waits_for_policy_removal() {
    let (server, client) = mock_api().await;
    mount_active_load_balancer(&server).await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_body("active")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/load_balancers/lb-1/listeners/lst-1/policies/pol-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    ListenerPolicies::new(client)
        .delete("lb-1/lst-1/pol-1")
        .await
        .expect("delete");
}

#[tokio::test]
async fn read_rejects_two_segment_id() {
    let (_server, client) = mock_api().await;

    let err = ListenerPolicies::new(client)
        .read("lb-1/pol-1")
        .await
        .expect_err("malformed id");

    assert!(matches!(err, VpcError::InvalidId { .. }));
}
