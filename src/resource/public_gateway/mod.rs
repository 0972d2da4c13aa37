//! Public gateways.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, non_blank, require,
};
use crate::vpc::types::{ByAddress, ById, ByName, Reference, ZoneRef};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{PUBLIC_GATEWAY_AVAILABLE, PUBLIC_GATEWAY_DELETED};

const KIND: &str = "public_gateway";

/// Collection path for public gateways.
pub(crate) const COLLECTION_PATH: &str = "/public_gateways";

/// Floating IP to reuse for the gateway.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayFloatingIp {
    /// Existing floating IP identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Existing floating IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Declarative configuration of a public gateway.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PublicGatewayConfig {
    /// Owning VPC.
    pub vpc: String,
    /// Zone name.
    pub zone: String,
    /// Gateway name.
    #[serde(default)]
    pub name: Option<String>,
    /// Floating IP to bind instead of reserving a new one.
    #[serde(default)]
    pub floating_ip: Option<GatewayFloatingIp>,
    /// Resource group identifier.
    #[serde(default)]
    pub resource_group: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FloatingIpIdentity<'a> {
    Id(ById<'a>),
    Address(ByAddress<'a>),
}

impl PublicGatewayConfig {
    fn floating_ip_identity(&self) -> Result<Option<FloatingIpIdentity<'_>>, VpcError> {
        let Some(floating_ip) = self.floating_ip.as_ref() else {
            return Ok(None);
        };
        match (
            non_blank(floating_ip.id.as_deref()),
            non_blank(floating_ip.address.as_deref()),
        ) {
            (Some(id), None) => Ok(Some(FloatingIpIdentity::Id(ById { id }))),
            (None, Some(address)) => {
                address.parse::<IpAddr>().map_err(|_| {
                    VpcError::Validation(format!(
                        "floating_ip.address must be an IP address, got '{address}'"
                    ))
                })?;
                Ok(Some(FloatingIpIdentity::Address(ByAddress { address })))
            }
            (Some(_), Some(_)) => Err(VpcError::Validation(String::from(
                "floating_ip accepts either id or address, not both",
            ))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
struct PublicGatewayPrototype<'a> {
    vpc: ById<'a>,
    zone: ByName<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    floating_ip: Option<FloatingIpIdentity<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_group: Option<ById<'a>>,
}

#[derive(Debug, Serialize)]
struct PublicGatewayPatch<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FloatingIpResponse {
    id: String,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublicGatewayResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    status: String,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    vpc: Option<Reference>,
    #[serde(default)]
    zone: Option<ZoneRef>,
    #[serde(default)]
    floating_ip: Option<FloatingIpResponse>,
    #[serde(default)]
    resource_group: Option<Reference>,
}

impl HasLifecycle for PublicGatewayResponse {
    fn lifecycle_state(&self) -> &str {
        &self.status
    }
}

/// Flat state of a public gateway.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PublicGatewayState {
    /// Gateway identifier.
    pub id: String,
    /// Gateway name.
    pub name: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Cloud resource name.
    pub crn: Option<String>,
    /// Canonical URL.
    pub href: Option<String>,
    /// Owning VPC identifier.
    pub vpc: Option<String>,
    /// Zone name.
    pub zone: Option<String>,
    /// Bound floating IP.
    pub floating_ip: Option<GatewayFloatingIp>,
    /// Resource group identifier.
    pub resource_group: Option<String>,
}

impl From<PublicGatewayResponse> for PublicGatewayState {
    fn from(response: PublicGatewayResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            status: response.status,
            crn: response.crn,
            href: response.href,
            vpc: response.vpc.map(|vpc| vpc.id),
            zone: response.zone.map(|zone| zone.name),
            floating_ip: response.floating_ip.map(|ip| GatewayFloatingIp {
                id: Some(ip.id),
                address: ip.address,
            }),
            resource_group: response.resource_group.map(|group| group.id),
        }
    }
}

fn gateway_path(id: &str) -> String {
    format!("{COLLECTION_PATH}/{id}")
}

/// Public gateway lifecycle.
#[derive(Clone, Debug)]
pub struct PublicGateways {
    client: VpcClient,
}

impl PublicGateways {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    /// Lists every public gateway.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when the listing fails.
    pub async fn list(&self) -> Result<Vec<PublicGatewayState>, VpcError> {
        let found: Vec<PublicGatewayResponse> = self
            .client
            .list_all(COLLECTION_PATH, "public_gateways", &[])
            .await?;
        Ok(found.into_iter().map(PublicGatewayState::from).collect())
    }

    async fn create_gateway(
        &self,
        config: &PublicGatewayConfig,
    ) -> Result<PublicGatewayState, VpcError> {
        require(&config.vpc, "vpc")?;
        require(&config.zone, "zone")?;
        let body = PublicGatewayPrototype {
            vpc: ById { id: &config.vpc },
            zone: ByName { name: &config.zone },
            name: non_blank(config.name.as_deref()),
            floating_ip: config.floating_ip_identity()?,
            resource_group: non_blank(config.resource_group.as_deref()).map(|id| ById { id }),
        };
        info!(vpc = %config.vpc, zone = %config.zone, "creating public gateway");
        let created: PublicGatewayResponse = self.client.post_json(COLLECTION_PATH, &body).await?;
        let settled: PublicGatewayResponse = Operation::new("create", KIND, &created.id)
            .settle_present(
                &self.client,
                &gateway_path(&created.id),
                PUBLIC_GATEWAY_AVAILABLE,
                self.client.timeouts().create,
            )
            .await?;
        Ok(settled.into())
    }

    async fn read_gateway(&self, id: &str) -> Result<Option<PublicGatewayState>, VpcError> {
        let found = absent_on_not_found(
            self.client
                .get_json::<PublicGatewayResponse>(&gateway_path(id))
                .await,
        )?;
        Ok(found.map(PublicGatewayState::from))
    }

    async fn update_gateway(
        &self,
        id: &str,
        config: &PublicGatewayConfig,
    ) -> Result<PublicGatewayState, VpcError> {
        let Some(name) = non_blank(config.name.as_deref()) else {
            return self
                .read_gateway(id)
                .await?
                .ok_or_else(|| VpcError::NotFound {
                    resource: String::from(KIND),
                    id: id.to_owned(),
                });
        };
        info!(id, name, "renaming public gateway");
        let updated: PublicGatewayResponse = self
            .client
            .patch_json(&gateway_path(id), &PublicGatewayPatch { name }, None)
            .await?;
        Ok(updated.into())
    }

    async fn delete_gateway(&self, id: &str) -> Result<(), VpcError> {
        let path = gateway_path(id);
        if self.read_gateway(id).await?.is_none() {
            info!(id, "public gateway already absent");
            return Ok(());
        }
        info!(id, "deleting public gateway");
        if absent_on_not_found(self.client.delete(&path, None).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<PublicGatewayResponse>(
                &self.client,
                &path,
                PUBLIC_GATEWAY_DELETED,
                self.client.timeouts().delete,
            )
            .await
            .map(|_| ())
    }
}

impl Resource for PublicGateways {
    type Config = PublicGatewayConfig;
    type State = PublicGatewayState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_gateway(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_gateway(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_gateway(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_gateway(id))
    }
}
