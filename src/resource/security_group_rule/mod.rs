//! Rules attached to a security group.
//!
//! Identifiers are composite: `{group}.{rule}`. Every mutation holds the
//! group's keyed lock so concurrent rule changes on one group are applied
//! one at a time.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Resource, ResourceFuture, absent_on_not_found, compose_id, non_blank, require, split_id};
use crate::mutex_kv::MutexKv;
use crate::remote::{RemotePrototype, RemoteRef};
use crate::vpc::{VpcClient, VpcError};

const KIND: &str = "security_group_rule";
const ID_SEPARATOR: char = '.';
const ICMP_TYPE_MAX: u16 = 254;
const ICMP_CODE_MAX: u16 = 255;
const PORT_MIN: u32 = 1;
const PORT_MAX: u32 = 65_535;

/// Name of the keyed lock guarding rule mutations on `group`.
#[must_use]
pub fn lock_key(group: &str) -> String {
    format!("security_group_rule_key_{group}")
}

/// Traffic direction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic entering the group.
    Inbound,
    /// Traffic leaving the group.
    Outbound,
}

/// ICMP block of a rule configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IcmpConfig {
    /// ICMP type, `0..=254`.
    #[serde(rename = "type", default)]
    pub icmp_type: Option<u16>,
    /// ICMP code, `0..=255`; requires a type.
    #[serde(default)]
    pub code: Option<u16>,
}

/// TCP or UDP block of a rule configuration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PortConfig {
    /// Lowest port, `1..=65535`.
    #[serde(default)]
    pub port_min: Option<u32>,
    /// Highest port, `1..=65535`.
    #[serde(default)]
    pub port_max: Option<u32>,
}

/// Declarative configuration of a security group rule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupRuleConfig {
    /// Owning security group.
    pub group: String,
    /// Traffic direction.
    pub direction: Direction,
    /// IP version; only `ipv4` is accepted.
    #[serde(default = "default_ip_version")]
    pub ip_version: String,
    /// Address, CIDR block, or security group identifier.
    #[serde(default)]
    pub remote: Option<String>,
    /// ICMP match.
    #[serde(default)]
    pub icmp: Option<IcmpConfig>,
    /// TCP match.
    #[serde(default)]
    pub tcp: Option<PortConfig>,
    /// UDP match.
    #[serde(default)]
    pub udp: Option<PortConfig>,
}

fn default_ip_version() -> String {
    String::from("ipv4")
}

/// Inclusive port range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortRange {
    /// Lowest port.
    pub min: u16,
    /// Highest port.
    pub max: u16,
}

/// Validated protocol match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleProtocol {
    /// Any protocol.
    All,
    /// ICMP with optional type and code.
    Icmp {
        /// ICMP type.
        icmp_type: Option<u16>,
        /// ICMP code.
        code: Option<u16>,
    },
    /// TCP port range.
    Tcp(PortRange),
    /// UDP port range.
    Udp(PortRange),
}

impl RuleProtocol {
    /// Protocol name as used by the API.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Icmp { .. } => "icmp",
            Self::Tcp(_) => "tcp",
            Self::Udp(_) => "udp",
        }
    }
}

impl SecurityGroupRuleConfig {
    /// Validates the configuration and resolves its protocol match.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Validation`] when more than one protocol block is
    /// set, when an ICMP code lacks a type, or when a value is out of range.
    pub fn protocol(&self) -> Result<RuleProtocol, VpcError> {
        require(&self.group, "group")?;
        if self.ip_version != "ipv4" {
            return Err(VpcError::Validation(format!(
                "ip_version must be ipv4, got {}",
                self.ip_version
            )));
        }
        match (&self.icmp, &self.tcp, &self.udp) {
            (None, None, None) => Ok(RuleProtocol::All),
            (Some(icmp), None, None) => icmp_protocol(icmp),
            (None, Some(tcp), None) => Ok(RuleProtocol::Tcp(port_range(tcp, "tcp")?)),
            (None, None, Some(udp)) => Ok(RuleProtocol::Udp(port_range(udp, "udp")?)),
            _ => Err(VpcError::Validation(String::from(
                "only one of icmp, tcp or udp may be set",
            ))),
        }
    }

    fn remote(&self) -> Option<RemoteRef> {
        non_blank(self.remote.as_deref()).map(RemoteRef::classify)
    }
}

fn icmp_protocol(icmp: &IcmpConfig) -> Result<RuleProtocol, VpcError> {
    if icmp.code.is_some() && icmp.icmp_type.is_none() {
        return Err(VpcError::Validation(String::from(
            "icmp code requires an icmp type",
        )));
    }
    if let Some(icmp_type) = icmp.icmp_type.filter(|value| *value > ICMP_TYPE_MAX) {
        return Err(VpcError::Validation(format!(
            "icmp type must be between 0 and {ICMP_TYPE_MAX}, got {icmp_type}"
        )));
    }
    if let Some(code) = icmp.code.filter(|value| *value > ICMP_CODE_MAX) {
        return Err(VpcError::Validation(format!(
            "icmp code must be between 0 and {ICMP_CODE_MAX}, got {code}"
        )));
    }
    Ok(RuleProtocol::Icmp {
        icmp_type: icmp.icmp_type,
        code: icmp.code,
    })
}

fn port_range(ports: &PortConfig, protocol: &str) -> Result<PortRange, VpcError> {
    let (min, max) = match (ports.port_min, ports.port_max) {
        (None, None) => (PORT_MIN, PORT_MAX),
        (Some(lone), None) | (None, Some(lone)) => (lone, lone),
        (Some(min), Some(max)) => (min, max),
    };
    let checked = |port: u32| {
        if (PORT_MIN..=PORT_MAX).contains(&port) {
            u16::try_from(port).map_err(|err| VpcError::Validation(err.to_string()))
        } else {
            Err(VpcError::Validation(format!(
                "{protocol} ports must be between {PORT_MIN} and {PORT_MAX}, got {port}"
            )))
        }
    };
    let range = PortRange {
        min: checked(min)?,
        max: checked(max)?,
    };
    if range.min > range.max {
        return Err(VpcError::Validation(format!(
            "{protocol} port_min {} exceeds port_max {}",
            range.min, range.max
        )));
    }
    Ok(range)
}

#[derive(Debug, Serialize)]
struct RuleBody<'a> {
    direction: Direction,
    ip_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<RemotePrototype>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    icmp_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_max: Option<u16>,
}

impl<'a> RuleBody<'a> {
    fn new(config: &'a SecurityGroupRuleConfig, protocol: RuleProtocol) -> Self {
        let (icmp_type, code, port_min, port_max) = match protocol {
            RuleProtocol::All => (None, None, None, None),
            RuleProtocol::Icmp { icmp_type, code } => (icmp_type, code, None, None),
            RuleProtocol::Tcp(range) | RuleProtocol::Udp(range) => {
                (None, None, Some(range.min), Some(range.max))
            }
        };
        Self {
            direction: config.direction,
            ip_version: &config.ip_version,
            protocol: Some(protocol.name()),
            remote: config.remote().map(RemoteRef::into_prototype),
            icmp_type,
            code,
            port_min,
            port_max,
        }
    }

    /// The protocol of an existing rule cannot be patched.
    const fn into_patch(mut self) -> Self {
        self.protocol = None;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RuleResponse {
    id: String,
    #[serde(default)]
    href: Option<String>,
    direction: Direction,
    #[serde(default)]
    ip_version: Option<String>,
    protocol: String,
    #[serde(default)]
    remote: Option<RemotePrototype>,
    #[serde(default)]
    port_min: Option<u16>,
    #[serde(default)]
    port_max: Option<u16>,
    #[serde(rename = "type", default)]
    icmp_type: Option<u16>,
    #[serde(default)]
    code: Option<u16>,
}

impl RuleResponse {
    fn into_state(self, group: &str) -> SecurityGroupRuleState {
        let remote = self
            .remote
            .as_ref()
            .and_then(RemoteRef::from_response)
            .map(|remote| remote.as_str().to_owned());
        SecurityGroupRuleState {
            id: compose_id(&[group, &self.id], ID_SEPARATOR),
            group: group.to_owned(),
            rule_id: self.id,
            direction: self.direction,
            ip_version: self.ip_version,
            protocol: self.protocol,
            remote,
            port_min: self.port_min,
            port_max: self.port_max,
            icmp_type: self.icmp_type,
            icmp_code: self.code,
            href: self.href,
        }
    }
}

/// Flat state of a security group rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SecurityGroupRuleState {
    /// Composite identifier `{group}.{rule}`.
    pub id: String,
    /// Owning security group.
    pub group: String,
    /// Rule identifier within the group.
    pub rule_id: String,
    /// Traffic direction.
    pub direction: Direction,
    /// IP version.
    pub ip_version: Option<String>,
    /// Protocol name.
    pub protocol: String,
    /// Remote address, CIDR block, or security group identifier.
    pub remote: Option<String>,
    /// Lowest port for TCP/UDP rules.
    pub port_min: Option<u16>,
    /// Highest port for TCP/UDP rules.
    pub port_max: Option<u16>,
    /// ICMP type.
    pub icmp_type: Option<u16>,
    /// ICMP code.
    pub icmp_code: Option<u16>,
    /// Canonical URL.
    pub href: Option<String>,
}

fn rules_path(group: &str) -> String {
    format!("/security_groups/{group}/rules")
}

fn rule_path(group: &str, rule: &str) -> String {
    format!("/security_groups/{group}/rules/{rule}")
}

/// Security group rule lifecycle.
#[derive(Clone, Debug)]
pub struct SecurityGroupRules {
    client: VpcClient,
    locks: &'static MutexKv,
}

impl SecurityGroupRules {
    /// Creates the resource using the process-wide lock registry.
    #[must_use]
    pub fn new(client: VpcClient) -> Self {
        Self {
            client,
            locks: MutexKv::global(),
        }
    }

    /// Uses a dedicated lock registry instead of the global one.
    #[must_use]
    pub const fn with_locks(mut self, locks: &'static MutexKv) -> Self {
        self.locks = locks;
        self
    }

    /// Lists every rule of `group`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when the listing fails.
    pub async fn list(&self, group: &str) -> Result<Vec<SecurityGroupRuleState>, VpcError> {
        let rules: Vec<RuleResponse> = self
            .client
            .list_all(&rules_path(group), "rules", &[])
            .await?;
        Ok(rules.into_iter().map(|rule| rule.into_state(group)).collect())
    }

    async fn create_rule(
        &self,
        config: &SecurityGroupRuleConfig,
    ) -> Result<SecurityGroupRuleState, VpcError> {
        let protocol = config.protocol()?;
        let _guard = self.locks.lock(&lock_key(&config.group)).await;
        info!(group = %config.group, protocol = protocol.name(), "creating security group rule");
        let created: RuleResponse = self
            .client
            .post_json(&rules_path(&config.group), &RuleBody::new(config, protocol))
            .await?;
        Ok(created.into_state(&config.group))
    }

    async fn read_rule(&self, id: &str) -> Result<Option<SecurityGroupRuleState>, VpcError> {
        let [group, rule] = split_id::<2>(id, ID_SEPARATOR)?;
        let found = absent_on_not_found(
            self.client
                .get_json::<RuleResponse>(&rule_path(group, rule))
                .await,
        )?;
        Ok(found.map(|response| response.into_state(group)))
    }

    async fn update_rule(
        &self,
        id: &str,
        config: &SecurityGroupRuleConfig,
    ) -> Result<SecurityGroupRuleState, VpcError> {
        let [group, rule] = split_id::<2>(id, ID_SEPARATOR)?;
        if group != config.group {
            return Err(VpcError::Validation(format!(
                "rule {id} belongs to group {group}, not {}",
                config.group
            )));
        }
        let protocol = config.protocol()?;
        let path = rule_path(group, rule);
        let _guard = self.locks.lock(&lock_key(group)).await;
        let current: RuleResponse = self.client.get_json(&path).await?;
        if current.protocol != protocol.name() {
            return Err(VpcError::Validation(format!(
                "protocol of rule {id} cannot change from {} to {}; recreate the rule",
                current.protocol,
                protocol.name()
            )));
        }
        info!(group, rule, "updating security group rule");
        let updated: RuleResponse = self
            .client
            .patch_json(&path, &RuleBody::new(config, protocol).into_patch(), None)
            .await?;
        Ok(updated.into_state(group))
    }

    async fn delete_rule(&self, id: &str) -> Result<(), VpcError> {
        let [group, rule] = split_id::<2>(id, ID_SEPARATOR)?;
        let path = rule_path(group, rule);
        let _guard = self.locks.lock(&lock_key(group)).await;
        if absent_on_not_found(self.client.get_json::<RuleResponse>(&path).await)?.is_none() {
            info!(group, rule, "security group rule already absent");
            return Ok(());
        }
        info!(group, rule, "deleting security group rule");
        absent_on_not_found(self.client.delete(&path, None).await).map(|_| ())
    }
}

impl Resource for SecurityGroupRules {
    type Config = SecurityGroupRuleConfig;
    type State = SecurityGroupRuleState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_rule(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_rule(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_rule(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_rule(id))
    }
}
