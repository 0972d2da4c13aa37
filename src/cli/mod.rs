//! Command-line interface definitions for the `vpcform` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `vpcform` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vpcform",
    about = "Drive the lifecycle of VPC networking resources",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create a resource from a manifest, or update it when `--id` is given.
    #[command(name = "apply")]
    Apply(ApplyCommand),
    /// Print the current state of a resource; `null` when it is gone.
    #[command(name = "read")]
    Read(TargetCommand),
    /// Delete a resource and wait until it is gone.
    #[command(name = "delete")]
    Delete(TargetCommand),
    /// Report whether a resource exists.
    #[command(name = "exists")]
    Exists(TargetCommand),
    /// List resources, filtered by name or tag.
    #[command(name = "list")]
    List(ListCommand),
    /// Show which field a security group rule `remote` value populates.
    #[command(name = "classify-remote")]
    ClassifyRemote(ClassifyCommand),
}

/// Resource kinds with a full lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ResourceKind {
    /// Rule in a security group (`group.rule` ids).
    SecurityGroupRule,
    /// Client-to-site VPN server.
    VpnServer,
    /// Floating IP.
    FloatingIp,
    /// Public gateway.
    PublicGateway,
    /// Public gateway attached to a subnet (subnet ids).
    SubnetPublicGatewayAttachment,
    /// Load balancer listener policy (`lb/listener/policy` ids).
    LbListenerPolicy,
    /// Image export job (`image/job` ids).
    ImageExportJob,
    /// Backup policy.
    BackupPolicy,
}

/// Resource kinds that can be listed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ListKind {
    /// VPN servers.
    VpnServer,
    /// Floating IPs.
    FloatingIp,
    /// Public gateways.
    PublicGateway,
    /// Backup policies.
    BackupPolicy,
    /// Rules of one security group; requires `--group`.
    SecurityGroupRule,
}

/// Arguments for `vpcform apply`.
#[derive(Debug, Parser)]
pub(crate) struct ApplyCommand {
    /// Kind of resource described by the manifest.
    #[arg(value_enum)]
    pub(crate) kind: ResourceKind,
    /// JSON manifest holding the resource configuration.
    #[arg(long, short = 'f', value_name = "PATH")]
    pub(crate) file: String,
    /// Identifier of an existing resource to update.
    #[arg(long, value_name = "ID")]
    pub(crate) id: Option<String>,
}

/// Arguments for commands addressing one resource.
#[derive(Debug, Parser)]
pub(crate) struct TargetCommand {
    /// Kind of resource.
    #[arg(value_enum)]
    pub(crate) kind: ResourceKind,
    /// Resource identifier.
    pub(crate) id: String,
}

/// Arguments for `vpcform list`.
#[derive(Debug, Parser)]
pub(crate) struct ListCommand {
    /// Kind of resource to list.
    #[arg(value_enum)]
    pub(crate) kind: ListKind,
    /// Keep only resources with this exact name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Keep only resources carrying this user tag.
    #[arg(long, value_name = "TAG")]
    pub(crate) tag: Option<String>,
    /// Security group whose rules are listed.
    #[arg(long, value_name = "GROUP")]
    pub(crate) group: Option<String>,
}

/// Arguments for `vpcform classify-remote`.
#[derive(Debug, Parser)]
pub(crate) struct ClassifyCommand {
    /// Address, CIDR block or security group identifier.
    pub(crate) value: String,
}
