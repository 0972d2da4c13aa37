//! Floating IP reservations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, non_blank};
use crate::vpc::types::{ById, ByName, Reference, ZoneRef};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{FLOATING_IP_AVAILABLE, FLOATING_IP_DELETED};

const KIND: &str = "floating_ip";

/// Collection path for floating IPs.
pub(crate) const COLLECTION_PATH: &str = "/floating_ips";

/// Declarative configuration of a floating IP.
///
/// Exactly one of `zone` and `target` must be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FloatingIpConfig {
    /// Name of the floating IP.
    #[serde(default)]
    pub name: Option<String>,
    /// Zone to reserve an unbound address in.
    #[serde(default)]
    pub zone: Option<String>,
    /// Network interface or attachment to bind to.
    #[serde(default)]
    pub target: Option<String>,
    /// Resource group identifier.
    #[serde(default)]
    pub resource_group: Option<String>,
}

/// Where a floating IP is placed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placement<'a> {
    /// Unbound reservation in a zone.
    Zone(&'a str),
    /// Bound to a target.
    Target(&'a str),
}

impl FloatingIpConfig {
    /// Resolves the placement.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Validation`] when both or neither of `zone` and
    /// `target` are set.
    pub fn placement(&self) -> Result<Placement<'_>, VpcError> {
        match (
            non_blank(self.zone.as_deref()),
            non_blank(self.target.as_deref()),
        ) {
            (Some(zone), None) => Ok(Placement::Zone(zone)),
            (None, Some(target)) => Ok(Placement::Target(target)),
            (Some(_), Some(_)) => Err(VpcError::Validation(String::from(
                "zone and target are mutually exclusive",
            ))),
            (None, None) => Err(VpcError::Validation(String::from(
                "one of zone or target is required",
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct FloatingIpPrototype<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<ByName<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<ById<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_group: Option<ById<'a>>,
}

#[derive(Debug, Serialize)]
struct FloatingIpPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<ById<'a>>,
}

/// What a bound floating IP points at.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "resource_type", rename_all = "snake_case")]
pub enum FloatingIpTarget {
    /// Instance network interface.
    NetworkInterface {
        /// Interface identifier.
        id: String,
        /// Interface name.
        #[serde(default)]
        name: Option<String>,
        /// Primary address of the interface.
        #[serde(default)]
        primary_ip: Option<PrimaryIp>,
    },
    /// Bare metal server network interface.
    BareMetalServerNetworkInterface {
        /// Interface identifier.
        id: String,
        /// Interface name.
        #[serde(default)]
        name: Option<String>,
        /// Primary address of the interface.
        #[serde(default)]
        primary_ip: Option<PrimaryIp>,
    },
    /// Public gateway using the address.
    PublicGateway {
        /// Gateway identifier.
        id: String,
        /// Gateway name.
        #[serde(default)]
        name: Option<String>,
        /// Gateway CRN.
        #[serde(default)]
        crn: Option<String>,
    },
    /// Virtual network interface.
    VirtualNetworkInterface {
        /// Interface identifier.
        id: String,
        /// Interface name.
        #[serde(default)]
        name: Option<String>,
        /// Interface CRN.
        #[serde(default)]
        crn: Option<String>,
    },
    /// Any target kind not listed above, kept by identifier and type.
    #[serde(untagged)]
    Other {
        /// Target identifier.
        id: String,
        /// Resource type reported by the API.
        resource_type: String,
    },
}

/// Primary address of a network interface target.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PrimaryIp {
    /// IP address.
    pub address: String,
}

impl FloatingIpTarget {
    /// Identifier of the target resource.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::NetworkInterface { id, .. }
            | Self::BareMetalServerNetworkInterface { id, .. }
            | Self::PublicGateway { id, .. }
            | Self::VirtualNetworkInterface { id, .. }
            | Self::Other { id, .. } => id,
        }
    }

    /// Private address the floating IP maps to, for interface targets.
    #[must_use]
    pub fn primary_address(&self) -> Option<&str> {
        match self {
            Self::NetworkInterface { primary_ip, .. }
            | Self::BareMetalServerNetworkInterface { primary_ip, .. } => {
                primary_ip.as_ref().map(|ip| ip.address.as_str())
            }
            Self::PublicGateway { .. }
            | Self::VirtualNetworkInterface { .. }
            | Self::Other { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FloatingIpResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    status: String,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    zone: Option<ZoneRef>,
    #[serde(default)]
    target: Option<FloatingIpTarget>,
    #[serde(default)]
    resource_group: Option<Reference>,
}

impl HasLifecycle for FloatingIpResponse {
    fn lifecycle_state(&self) -> &str {
        &self.status
    }
}

/// Flat state of a floating IP.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FloatingIpState {
    /// Floating IP identifier.
    pub id: String,
    /// Name.
    pub name: Option<String>,
    /// Public address.
    pub address: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Cloud resource name.
    pub crn: Option<String>,
    /// Canonical URL.
    pub href: Option<String>,
    /// Zone name.
    pub zone: Option<String>,
    /// Identifier of the bound target.
    pub target: Option<String>,
    /// Full target description.
    pub target_detail: Option<FloatingIpTarget>,
    /// Resource group identifier.
    pub resource_group: Option<String>,
}

impl From<FloatingIpResponse> for FloatingIpState {
    fn from(response: FloatingIpResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            address: response.address,
            status: response.status,
            crn: response.crn,
            href: response.href,
            zone: response.zone.map(|zone| zone.name),
            target: response.target.as_ref().map(|target| target.id().to_owned()),
            target_detail: response.target,
            resource_group: response.resource_group.map(|group| group.id),
        }
    }
}

fn floating_ip_path(id: &str) -> String {
    format!("{COLLECTION_PATH}/{id}")
}

/// Floating IP lifecycle.
#[derive(Clone, Debug)]
pub struct FloatingIps {
    client: VpcClient,
}

impl FloatingIps {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    /// Lists every floating IP in the region.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when the listing fails.
    pub async fn list(&self) -> Result<Vec<FloatingIpState>, VpcError> {
        let found: Vec<FloatingIpResponse> = self
            .client
            .list_all(COLLECTION_PATH, "floating_ips", &[])
            .await?;
        Ok(found.into_iter().map(FloatingIpState::from).collect())
    }

    async fn create_ip(&self, config: &FloatingIpConfig) -> Result<FloatingIpState, VpcError> {
        let placement = config.placement()?;
        let (zone, target) = match placement {
            Placement::Zone(name) => (Some(ByName { name }), None),
            Placement::Target(id) => (None, Some(ById { id })),
        };
        let body = FloatingIpPrototype {
            name: non_blank(config.name.as_deref()),
            zone,
            target,
            resource_group: non_blank(config.resource_group.as_deref()).map(|id| ById { id }),
        };
        info!(?placement, "reserving floating IP");
        let created: FloatingIpResponse = self.client.post_json(COLLECTION_PATH, &body).await?;
        self.await_available("create", &created.id, self.client.timeouts().create)
            .await
    }

    async fn await_available(
        &self,
        action: &'static str,
        id: &str,
        timeout: Duration,
    ) -> Result<FloatingIpState, VpcError> {
        let settled: FloatingIpResponse = Operation::new(action, KIND, id)
            .settle_present(&self.client, &floating_ip_path(id), FLOATING_IP_AVAILABLE, timeout)
            .await?;
        Ok(settled.into())
    }

    async fn read_ip(&self, id: &str) -> Result<Option<FloatingIpState>, VpcError> {
        let found = absent_on_not_found(
            self.client
                .get_json::<FloatingIpResponse>(&floating_ip_path(id))
                .await,
        )?;
        Ok(found.map(FloatingIpState::from))
    }

    async fn update_ip(
        &self,
        id: &str,
        config: &FloatingIpConfig,
    ) -> Result<FloatingIpState, VpcError> {
        let target = match config.placement()? {
            Placement::Target(target) => Some(ById { id: target }),
            Placement::Zone(_) => None,
        };
        let body = FloatingIpPatch {
            name: non_blank(config.name.as_deref()),
            target,
        };
        info!(id, "updating floating IP");
        let _: FloatingIpResponse = self
            .client
            .patch_json(&floating_ip_path(id), &body, None)
            .await?;
        self.await_available("update", id, self.client.timeouts().update)
            .await
    }

    async fn delete_ip(&self, id: &str) -> Result<(), VpcError> {
        let path = floating_ip_path(id);
        if self.read_ip(id).await?.is_none() {
            info!(id, "floating IP already released");
            return Ok(());
        }
        info!(id, "releasing floating IP");
        if absent_on_not_found(self.client.delete(&path, None).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<FloatingIpResponse>(
                &self.client,
                &path,
                FLOATING_IP_DELETED,
                self.client.timeouts().delete,
            )
            .await
            .map(|_| ())
    }
}

impl Resource for FloatingIps {
    type Config = FloatingIpConfig;
    type State = FloatingIpState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_ip(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_ip(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_ip(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_ip(id))
    }
}
