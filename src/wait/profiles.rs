//! Per-resource lifecycle profiles.
//!
//! Each resource keeps its own pending/target/failed sets. Several of them
//! overlap, but they are kept apart because the remote API reports slightly
//! different vocabularies per resource family.

use super::{LifecycleProfile, WaitMode};

/// VPN server creation or update settling on `stable`.
pub const VPN_SERVER_STABLE: LifecycleProfile = LifecycleProfile {
    pending: &["pending", "updating"],
    target: &["stable"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// VPN server removal. Any state besides `retry` and `deleting` ends the
/// wait as unexpected.
pub const VPN_SERVER_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["retry", "deleting"],
    target: &["deleted"],
    failed: &["failed"],
    mode: WaitMode::Delete,
};

/// Floating IP reservation settling on `available`.
pub const FLOATING_IP_AVAILABLE: LifecycleProfile = LifecycleProfile {
    pending: &["pending"],
    target: &["available"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Floating IP release.
pub const FLOATING_IP_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["pending", "deleting", "available"],
    target: &["deleted"],
    failed: &["failed"],
    mode: WaitMode::Delete,
};

/// Public gateway creation settling on `available`.
pub const PUBLIC_GATEWAY_AVAILABLE: LifecycleProfile = LifecycleProfile {
    pending: &["pending"],
    target: &["available"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Public gateway removal.
pub const PUBLIC_GATEWAY_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["pending", "deleting", "available"],
    target: &["deleted"],
    failed: &["failed"],
    mode: WaitMode::Delete,
};

/// Subnet settling after a public gateway is attached or detached.
pub const SUBNET_AVAILABLE: LifecycleProfile = LifecycleProfile {
    pending: &["pending", "updating"],
    target: &["available"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Load balancer ready to accept a listener-policy mutation.
pub const LOAD_BALANCER_ACTIVE: LifecycleProfile = LifecycleProfile {
    pending: &["create_pending", "update_pending", "maintenance_pending"],
    target: &["active"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Listener policy provisioning.
pub const LB_LISTENER_POLICY_ACTIVE: LifecycleProfile = LifecycleProfile {
    pending: &[
        "pending",
        "retry",
        "create_pending",
        "update_pending",
        "maintenance_pending",
    ],
    target: &["active"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Listener policy removal.
pub const LB_LISTENER_POLICY_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["retry", "delete_pending", "deleting", "active"],
    target: &["deleted"],
    failed: &["failed"],
    mode: WaitMode::Delete,
};

/// Image export job running to completion.
pub const IMAGE_EXPORT_JOB_DONE: LifecycleProfile = LifecycleProfile {
    pending: &["queued", "running"],
    target: &["succeeded"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Image export job removal.
pub const IMAGE_EXPORT_JOB_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["queued", "running", "deleting", "succeeded", "failed"],
    target: &[],
    failed: &[],
    mode: WaitMode::Delete,
};

/// Backup policy creation or update settling on `stable`.
pub const BACKUP_POLICY_STABLE: LifecycleProfile = LifecycleProfile {
    pending: &["pending", "updating", "waiting"],
    target: &["stable"],
    failed: &["failed"],
    mode: WaitMode::Provision,
};

/// Backup policy removal.
pub const BACKUP_POLICY_DELETED: LifecycleProfile = LifecycleProfile {
    pending: &["deleting", "stable", "updating", "waiting"],
    target: &["deleted"],
    failed: &["failed"],
    mode: WaitMode::Delete,
};
