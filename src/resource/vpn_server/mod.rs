//! Client-to-site VPN servers.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, non_blank, require};
use crate::vpc::types::{AddressRef, ByAddress, ById, ByCrn, CrnRef, Reference};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{VPN_SERVER_DELETED, VPN_SERVER_STABLE};

const KIND: &str = "vpn_server";
const CERTIFICATE_METHOD: &str = "certificate";
const USERNAME_METHOD: &str = "username";

/// One client authentication method.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientAuthentication {
    /// `certificate` or `username`.
    pub method: String,
    /// CA certificate CRN; required for `certificate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ca_crn: Option<String>,
    /// Identity provider type; required for `username`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_provider: Option<String>,
}

/// Declarative configuration of a VPN server.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VpnServerConfig {
    /// Server certificate CRN.
    pub certificate_crn: String,
    /// Authentication methods offered to clients.
    pub client_authentication: Vec<ClientAuthentication>,
    /// DNS servers pushed to clients.
    #[serde(default)]
    pub client_dns_server_ips: Vec<String>,
    /// Seconds before an idle client is disconnected.
    #[serde(default)]
    pub client_idle_timeout: Option<u32>,
    /// CIDR block clients draw addresses from.
    pub client_ip_pool: String,
    /// Route only VPC traffic through the tunnel.
    #[serde(default)]
    pub enable_split_tunneling: Option<bool>,
    /// Server name.
    #[serde(default)]
    pub name: Option<String>,
    /// Listening port.
    #[serde(default)]
    pub port: Option<u16>,
    /// `udp` or `tcp`.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Resource group identifier.
    #[serde(default)]
    pub resource_group: Option<String>,
    /// Security groups applied to the server.
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Subnets hosting the server.
    pub subnets: Vec<String>,
}

impl VpnServerConfig {
    /// Checks local consistency.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Validation`] for a missing certificate, subnet or
    /// authentication method, an unusable authentication entry, or a client
    /// pool that is not a CIDR block.
    pub fn validate(&self) -> Result<(), VpcError> {
        require(&self.certificate_crn, "certificate_crn")?;
        if self.subnets.is_empty() {
            return Err(VpcError::Validation(String::from(
                "at least one subnet is required",
            )));
        }
        if self.client_authentication.is_empty() {
            return Err(VpcError::Validation(String::from(
                "at least one client_authentication entry is required",
            )));
        }
        for auth in &self.client_authentication {
            validate_authentication(auth)?;
        }
        if !self.client_ip_pool.contains('/') || self.client_ip_pool.parse::<IpNetwork>().is_err()
        {
            return Err(VpcError::Validation(format!(
                "client_ip_pool must be a CIDR block, got '{}'",
                self.client_ip_pool
            )));
        }
        match self.protocol.as_deref() {
            None | Some("udp" | "tcp") => Ok(()),
            Some(other) => Err(VpcError::Validation(format!(
                "protocol must be udp or tcp, got {other}"
            ))),
        }
    }
}

fn validate_authentication(auth: &ClientAuthentication) -> Result<(), VpcError> {
    match auth.method.as_str() {
        CERTIFICATE_METHOD if non_blank(auth.client_ca_crn.as_deref()).is_none() => {
            Err(VpcError::Validation(String::from(
                "method `certificate` should be passed with `client_ca_crn`",
            )))
        }
        CERTIFICATE_METHOD => Ok(()),
        USERNAME_METHOD if non_blank(auth.identity_provider.as_deref()).is_none() => {
            Err(VpcError::Validation(String::from(
                "method `username` should be passed with `identity_provider`",
            )))
        }
        USERNAME_METHOD => Ok(()),
        other => Err(VpcError::Validation(format!(
            "client authentication method must be certificate or username, got {other}"
        ))),
    }
}

#[derive(Debug, Serialize)]
struct ProviderType<'a> {
    provider_type: &'a str,
}

#[derive(Debug, Serialize)]
struct AuthenticationPrototype<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ca: Option<ByCrn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity_provider: Option<ProviderType<'a>>,
}

impl<'a> From<&'a ClientAuthentication> for AuthenticationPrototype<'a> {
    fn from(auth: &'a ClientAuthentication) -> Self {
        if auth.method == CERTIFICATE_METHOD {
            Self {
                method: &auth.method,
                client_ca: auth.client_ca_crn.as_deref().map(|crn| ByCrn { crn }),
                identity_provider: None,
            }
        } else {
            Self {
                method: &auth.method,
                client_ca: None,
                identity_provider: auth
                    .identity_provider
                    .as_deref()
                    .map(|provider_type| ProviderType { provider_type }),
            }
        }
    }
}

/// Shared by create and update; update leaves `resource_group` and
/// `security_groups` unset.
#[derive(Debug, Serialize)]
struct VpnServerBody<'a> {
    certificate: ByCrn<'a>,
    client_authentication: Vec<AuthenticationPrototype<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    client_dns_server_ips: Vec<ByAddress<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_idle_timeout: Option<u32>,
    client_ip_pool: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_split_tunneling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_group: Option<ById<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    security_groups: Vec<ById<'a>>,
    subnets: Vec<ById<'a>>,
}

impl<'a> VpnServerBody<'a> {
    fn prototype(config: &'a VpnServerConfig) -> Self {
        Self {
            certificate: ByCrn {
                crn: &config.certificate_crn,
            },
            client_authentication: config
                .client_authentication
                .iter()
                .map(AuthenticationPrototype::from)
                .collect(),
            client_dns_server_ips: config
                .client_dns_server_ips
                .iter()
                .map(|address| ByAddress { address })
                .collect(),
            client_idle_timeout: config.client_idle_timeout,
            client_ip_pool: &config.client_ip_pool,
            enable_split_tunneling: config.enable_split_tunneling,
            name: non_blank(config.name.as_deref()),
            port: config.port,
            protocol: config.protocol.as_deref(),
            resource_group: non_blank(config.resource_group.as_deref()).map(|id| ById { id }),
            security_groups: config
                .security_groups
                .iter()
                .map(|id| ById { id })
                .collect(),
            subnets: config.subnets.iter().map(|id| ById { id }).collect(),
        }
    }

    fn patch(config: &'a VpnServerConfig) -> Self {
        let mut body = Self::prototype(config);
        body.resource_group = None;
        body.security_groups.clear();
        body
    }
}

#[derive(Debug, Deserialize)]
struct AuthenticationResponse {
    method: String,
    #[serde(default)]
    client_ca: Option<CrnRef>,
    #[serde(default)]
    identity_provider: Option<ProviderTypeResponse>,
}

#[derive(Debug, Deserialize)]
struct ProviderTypeResponse {
    provider_type: String,
}

#[derive(Debug, Deserialize)]
struct VpnServerResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    href: Option<String>,
    lifecycle_state: String,
    #[serde(default)]
    health_state: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    certificate: Option<CrnRef>,
    #[serde(default)]
    client_authentication: Vec<AuthenticationResponse>,
    #[serde(default)]
    client_dns_server_ips: Vec<AddressRef>,
    #[serde(default)]
    client_idle_timeout: Option<u32>,
    #[serde(default)]
    client_ip_pool: Option<String>,
    #[serde(default)]
    enable_split_tunneling: Option<bool>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    resource_group: Option<Reference>,
    #[serde(default)]
    security_groups: Vec<Reference>,
    #[serde(default)]
    subnets: Vec<Reference>,
    #[serde(default)]
    vpc: Option<Reference>,
    #[serde(default)]
    private_ips: Vec<AddressRef>,
}

impl HasLifecycle for VpnServerResponse {
    fn lifecycle_state(&self) -> &str {
        &self.lifecycle_state
    }
}

/// Flat state of a VPN server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VpnServerState {
    /// Server identifier.
    pub id: String,
    /// Server name.
    pub name: Option<String>,
    /// Cloud resource name.
    pub crn: Option<String>,
    /// Canonical URL.
    pub href: Option<String>,
    /// Lifecycle state.
    pub lifecycle_state: String,
    /// Health state.
    pub health_state: Option<String>,
    /// Hostname clients connect to.
    pub hostname: Option<String>,
    /// Server certificate CRN.
    pub certificate_crn: Option<String>,
    /// Client authentication methods.
    pub client_authentication: Vec<ClientAuthentication>,
    /// DNS servers pushed to clients.
    pub client_dns_server_ips: Vec<String>,
    /// Idle timeout in seconds.
    pub client_idle_timeout: Option<u32>,
    /// Client address pool.
    pub client_ip_pool: Option<String>,
    /// Split tunnelling flag.
    pub enable_split_tunneling: Option<bool>,
    /// Listening port.
    pub port: Option<u16>,
    /// Transport protocol.
    pub protocol: Option<String>,
    /// Resource group identifier.
    pub resource_group: Option<String>,
    /// Security group identifiers.
    pub security_groups: Vec<String>,
    /// Subnet identifiers.
    pub subnets: Vec<String>,
    /// Owning VPC.
    pub vpc: Option<Reference>,
    /// Private addresses of the server.
    pub private_ips: Vec<String>,
}

impl From<VpnServerResponse> for VpnServerState {
    fn from(response: VpnServerResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            crn: response.crn,
            href: response.href,
            lifecycle_state: response.lifecycle_state,
            health_state: response.health_state,
            hostname: response.hostname,
            certificate_crn: response.certificate.map(|certificate| certificate.crn),
            client_authentication: response
                .client_authentication
                .into_iter()
                .map(|auth| ClientAuthentication {
                    method: auth.method,
                    client_ca_crn: auth.client_ca.map(|ca| ca.crn),
                    identity_provider: auth.identity_provider.map(|idp| idp.provider_type),
                })
                .collect(),
            client_dns_server_ips: addresses(response.client_dns_server_ips),
            client_idle_timeout: response.client_idle_timeout,
            client_ip_pool: response.client_ip_pool,
            enable_split_tunneling: response.enable_split_tunneling,
            port: response.port,
            protocol: response.protocol,
            resource_group: response.resource_group.map(|group| group.id),
            security_groups: ids(response.security_groups),
            subnets: ids(response.subnets),
            vpc: response.vpc,
            private_ips: addresses(response.private_ips),
        }
    }
}

fn ids(references: Vec<Reference>) -> Vec<String> {
    references.into_iter().map(|reference| reference.id).collect()
}

fn addresses(references: Vec<AddressRef>) -> Vec<String> {
    references
        .into_iter()
        .map(|reference| reference.address)
        .collect()
}

/// Collection path for VPN servers.
pub(crate) const COLLECTION_PATH: &str = "/vpn_servers";

fn server_path(id: &str) -> String {
    format!("{COLLECTION_PATH}/{id}")
}

/// VPN server lifecycle.
#[derive(Clone, Debug)]
pub struct VpnServers {
    client: VpcClient,
}

impl VpnServers {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    /// Lists every VPN server.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when the listing fails.
    pub async fn list(&self) -> Result<Vec<VpnServerState>, VpcError> {
        let servers: Vec<VpnServerResponse> = self
            .client
            .list_all(COLLECTION_PATH, "vpn_servers", &[])
            .await?;
        Ok(servers.into_iter().map(VpnServerState::from).collect())
    }

    async fn create_server(&self, config: &VpnServerConfig) -> Result<VpnServerState, VpcError> {
        config.validate()?;
        info!(name = ?config.name, "creating VPN server");
        let created: VpnServerResponse = self
            .client
            .post_json(COLLECTION_PATH, &VpnServerBody::prototype(config))
            .await?;
        let path = server_path(&created.id);
        let settled: VpnServerResponse = Operation::new("create", KIND, &created.id)
            .settle_present(
                &self.client,
                &path,
                VPN_SERVER_STABLE,
                self.client.timeouts().create,
            )
            .await?;
        Ok(settled.into())
    }

    async fn read_server(&self, id: &str) -> Result<Option<VpnServerState>, VpcError> {
        let found = absent_on_not_found(
            self.client
                .get_json::<VpnServerResponse>(&server_path(id))
                .await,
        )?;
        Ok(found.map(VpnServerState::from))
    }

    async fn update_server(
        &self,
        id: &str,
        config: &VpnServerConfig,
    ) -> Result<VpnServerState, VpcError> {
        config.validate()?;
        let path = server_path(id);
        let (_, etag) = self
            .client
            .get_json_with_etag::<VpnServerResponse>(&path)
            .await?;
        info!(id, "updating VPN server");
        let _: VpnServerResponse = self
            .client
            .patch_json(&path, &VpnServerBody::patch(config), etag.as_ref())
            .await?;
        let settled: VpnServerResponse = Operation::new("update", KIND, id)
            .settle_present(
                &self.client,
                &path,
                VPN_SERVER_STABLE,
                self.client.timeouts().update,
            )
            .await?;
        Ok(settled.into())
    }

    async fn delete_server(&self, id: &str) -> Result<(), VpcError> {
        let path = server_path(id);
        let Some((_, etag)) = absent_on_not_found(
            self.client
                .get_json_with_etag::<VpnServerResponse>(&path)
                .await,
        )?
        else {
            info!(id, "VPN server already absent");
            return Ok(());
        };
        info!(id, "deleting VPN server");
        if absent_on_not_found(self.client.delete(&path, etag.as_ref()).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<VpnServerResponse>(
                &self.client,
                &path,
                VPN_SERVER_DELETED,
                self.client.timeouts().delete,
            )
            .await
            .map(|_| ())
    }
}

impl Resource for VpnServers {
    type Config = VpnServerConfig;
    type State = VpnServerState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_server(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_server(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_server(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_server(id))
    }
}

#[cfg(test)]
mod tests;
