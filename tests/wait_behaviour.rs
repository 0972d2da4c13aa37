//! Behavioural tests for the lifecycle poller across resource profiles.

use std::time::{Duration, Instant};

use rstest::rstest;
use vpcform::test_support::{ScriptedFetch, ScriptedFetchError};
use vpcform::wait::profiles::{
    BACKUP_POLICY_STABLE, FLOATING_IP_AVAILABLE, FLOATING_IP_DELETED, IMAGE_EXPORT_JOB_DONE,
    LB_LISTENER_POLICY_ACTIVE, LOAD_BALANCER_ACTIVE, PUBLIC_GATEWAY_AVAILABLE, SUBNET_AVAILABLE,
};
use vpcform::{LifecycleProfile, StateWaiter, WaitError, WaitMode, WaitOutcome, WaitSpec};

const FAST: Duration = Duration::from_millis(1);

fn waiter(profile: LifecycleProfile, timeout: Duration) -> StateWaiter {
    StateWaiter::new(WaitSpec::new(profile, FAST, timeout))
}

#[rstest]
#[case::floating_ip(FLOATING_IP_AVAILABLE)]
#[case::public_gateway(PUBLIC_GATEWAY_AVAILABLE)]
#[case::subnet(SUBNET_AVAILABLE)]
#[case::load_balancer(LOAD_BALANCER_ACTIVE)]
#[case::listener_policy(LB_LISTENER_POLICY_ACTIVE)]
#[case::export_job(IMAGE_EXPORT_JOB_DONE)]
#[case::backup_policy(BACKUP_POLICY_STABLE)]
#[tokio::test]
async fn every_pending_state_is_polled_through(#[case] profile: LifecycleProfile) {
    let script = ScriptedFetch::new();
    for state in profile.pending {
        script.push_state(state);
    }
    let Some(target) = profile.target.first() else {
        panic!("provisioning profiles have a target state");
    };
    script.push_state(target);

    let outcome = waiter(profile, Duration::from_secs(5))
        .wait("resource", || script.fetch())
        .await
        .unwrap_or_else(|err| panic!("wait failed: {err}"));

    assert_eq!(outcome.state(), *target);
    assert_eq!(
        usize::try_from(script.calls()).ok(),
        Some(profile.pending.len() + 1)
    );
}

#[tokio::test]
async fn polling_stops_at_the_deadline() {
    let script = ScriptedFetch::from_states(&["pending"]);
    let delay = Duration::from_millis(20);
    let timeout = Duration::from_millis(200);
    let started = Instant::now();

    let err = StateWaiter::new(WaitSpec::new(FLOATING_IP_AVAILABLE, delay, timeout))
        .wait("floating ip", || script.fetch())
        .await
        .expect_err("never settles");

    let WaitError::Timeout {
        attempts,
        last_state,
        ..
    } = err
    else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(last_state, "pending");
    assert!(attempts <= 11, "too many polls: {attempts}");
    assert_eq!(attempts, script.calls());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn delete_profile_ends_on_absence() {
    let script = ScriptedFetch::from_states(&["deleting", "deleting"]);
    script.push_not_found();

    let outcome = waiter(FLOATING_IP_DELETED, Duration::from_secs(5))
        .wait("floating ip", || script.fetch())
        .await
        .unwrap_or_else(|err| panic!("wait failed: {err}"));

    assert_eq!(outcome, WaitOutcome::Deleted);
    assert_eq!(FLOATING_IP_DELETED.mode, WaitMode::Delete);
    assert_eq!(script.calls(), 3);
}

#[tokio::test]
async fn not_found_budget_is_configurable() {
    let script = ScriptedFetch::new();
    script.push_missing();
    let spec = WaitSpec::new(PUBLIC_GATEWAY_AVAILABLE, FAST, Duration::from_secs(5))
        .not_found_checks(2);

    let err = StateWaiter::new(spec)
        .wait("public gateway", || script.fetch())
        .await
        .expect_err("gateway never appears");

    assert_eq!(err, WaitError::NotFound { checks: 3 });
}

#[tokio::test]
async fn transport_failures_surface_unchanged() {
    let script = ScriptedFetch::new();
    script.push_failure("connection reset");

    let err = waiter(SUBNET_AVAILABLE, Duration::from_secs(5))
        .wait("subnet", || script.fetch())
        .await
        .expect_err("fetch fails");

    assert_eq!(
        err,
        WaitError::Fetch(ScriptedFetchError::Failure(String::from(
            "connection reset"
        )))
    );
    assert_eq!(script.calls(), 1);
}
