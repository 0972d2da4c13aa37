//! Binary entry point for the `vpcform` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use cli::{ApplyCommand, Cli, ListCommand, ListKind, ResourceKind, TargetCommand};
use vpcform::resource::backup_policy::BackupPolicies;
use vpcform::resource::floating_ip::FloatingIps;
use vpcform::resource::image_export_job::ImageExportJobs;
use vpcform::resource::lb_listener_policy::ListenerPolicies;
use vpcform::resource::public_gateway::PublicGateways;
use vpcform::resource::security_group_rule::SecurityGroupRules;
use vpcform::resource::subnet_public_gateway_attachment::SubnetPublicGatewayAttachments;
use vpcform::resource::vpn_server::VpnServers;
use vpcform::{
    ConfigError, DataSource, Filter, ManifestError, RemoteRef, Resource, VpcClient, VpcConfig,
    VpcError, load_manifest, to_attributes,
};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "VPCFORM_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Vpc(#[from] VpcError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("invalid usage: {0}")]
    Usage(String),
    #[error("failed to write output: {0}")]
    Output(String),
}

/// Lifecycle operation applied to one resource kind.
#[derive(Debug)]
enum Op {
    Apply {
        file: Utf8PathBuf,
        id: Option<String>,
    },
    Read(String),
    Delete(String),
    Exists(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let output = match cli {
        Cli::ClassifyRemote(command) => classify(&command.value)?,
        Cli::Apply(ApplyCommand { kind, file, id }) => {
            let op = Op::Apply {
                file: Utf8PathBuf::from(file),
                id,
            };
            run_kind(kind, connect()?, op).await?
        }
        Cli::Read(TargetCommand { kind, id }) => run_kind(kind, connect()?, Op::Read(id)).await?,
        Cli::Delete(TargetCommand { kind, id }) => {
            run_kind(kind, connect()?, Op::Delete(id)).await?
        }
        Cli::Exists(TargetCommand { kind, id }) => {
            run_kind(kind, connect()?, Op::Exists(id)).await?
        }
        Cli::List(command) => {
            check_list_args(&command)?;
            list(connect()?, command).await?
        }
    };
    write_output(io::stdout(), &output)
}

fn connect() -> Result<VpcClient, CliError> {
    let config = VpcConfig::load_without_cli_args()?;
    debug!(region = %config.region, "loaded configuration");
    Ok(VpcClient::new(&config)?)
}

async fn run_kind(kind: ResourceKind, client: VpcClient, op: Op) -> Result<Value, CliError> {
    match kind {
        ResourceKind::SecurityGroupRule => run(&SecurityGroupRules::new(client), op).await,
        ResourceKind::VpnServer => run(&VpnServers::new(client), op).await,
        ResourceKind::FloatingIp => run(&FloatingIps::new(client), op).await,
        ResourceKind::PublicGateway => run(&PublicGateways::new(client), op).await,
        ResourceKind::SubnetPublicGatewayAttachment => {
            run(&SubnetPublicGatewayAttachments::new(client), op).await
        }
        ResourceKind::LbListenerPolicy => run(&ListenerPolicies::new(client), op).await,
        ResourceKind::ImageExportJob => run(&ImageExportJobs::new(client), op).await,
        ResourceKind::BackupPolicy => run(&BackupPolicies::new(client), op).await,
    }
}

async fn run<R: Resource>(resource: &R, op: Op) -> Result<Value, CliError> {
    debug!(kind = R::KIND, ?op, "running operation");
    match op {
        Op::Apply { file, id } => {
            let config: R::Config = load_manifest(&file)?;
            let state = match id {
                Some(existing) => resource.update(&existing, &config).await?,
                None => resource.create(&config).await?,
            };
            Ok(Value::Object(to_attributes(&state)?))
        }
        Op::Read(id) => match resource.read(&id).await? {
            Some(state) => Ok(Value::Object(to_attributes(&state)?)),
            None => Ok(Value::Null),
        },
        Op::Delete(id) => {
            resource.delete(&id).await?;
            Ok(json!({ "id": id, "deleted": true }))
        }
        Op::Exists(id) => {
            let exists = resource.exists(&id).await?;
            Ok(json!({ "id": id, "exists": exists }))
        }
    }
}

fn check_list_args(command: &ListCommand) -> Result<(), CliError> {
    match (command.kind, command.group.is_some()) {
        (ListKind::SecurityGroupRule, false) => Err(CliError::Usage(String::from(
            "--group is required when listing security group rules",
        ))),
        (ListKind::SecurityGroupRule, true)
            if command.name.is_some() || command.tag.is_some() =>
        {
            Err(CliError::Usage(String::from(
                "security group rules cannot be filtered by --name or --tag",
            )))
        }
        (ListKind::SecurityGroupRule, true) | (_, false) => Ok(()),
        (_, true) => Err(CliError::Usage(String::from(
            "--group only applies to security group rules",
        ))),
    }
}

async fn list(client: VpcClient, command: ListCommand) -> Result<Value, CliError> {
    let source = DataSource::new(client);
    let filter = Filter {
        name: command.name,
        tag: command.tag,
    };
    match command.kind {
        ListKind::VpnServer => attributes_of(&source.vpn_servers(&filter).await?),
        ListKind::FloatingIp => attributes_of(&source.floating_ips(&filter).await?),
        ListKind::PublicGateway => attributes_of(&source.public_gateways(&filter).await?),
        ListKind::BackupPolicy => attributes_of(&source.backup_policies(&filter).await?),
        ListKind::SecurityGroupRule => {
            let group = command.group.unwrap_or_default();
            attributes_of(&source.security_group_rules(&group).await?)
        }
    }
}

fn attributes_of<S: Serialize>(items: &[S]) -> Result<Value, CliError> {
    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        rendered.push(Value::Object(to_attributes(item)?));
    }
    Ok(Value::Array(rendered))
}

fn classify(value: &str) -> Result<Value, CliError> {
    let prototype = RemoteRef::classify(value).into_prototype();
    serde_json::to_value(prototype).map_err(|err| CliError::Output(err.to_string()))
}

fn write_output(mut target: impl Write, value: &Value) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
