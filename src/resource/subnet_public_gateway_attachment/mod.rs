//! Attachment of a public gateway to a subnet.
//!
//! The attachment has no identity of its own; it is addressed by the subnet
//! identifier. Every mutation is followed by a wait for the subnet to return
//! to `available`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, require};
use crate::vpc::types::{ById, Reference, ZoneRef};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::SUBNET_AVAILABLE;

const KIND: &str = "subnet_public_gateway_attachment";

/// Declarative configuration of an attachment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AttachmentConfig {
    /// Subnet identifier.
    pub subnet: String,
    /// Public gateway identifier.
    pub public_gateway: String,
}

#[derive(Debug, Deserialize)]
struct SubnetResponse {
    status: String,
}

impl HasLifecycle for SubnetResponse {
    fn lifecycle_state(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    vpc: Option<Reference>,
    #[serde(default)]
    zone: Option<ZoneRef>,
    #[serde(default)]
    floating_ip: Option<FloatingIpResponse>,
}

#[derive(Debug, Deserialize)]
struct FloatingIpResponse {
    #[serde(default)]
    address: Option<String>,
}

/// Flat state of an attachment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AttachmentState {
    /// Subnet identifier, which doubles as the attachment identifier.
    pub id: String,
    /// Subnet identifier.
    pub subnet: String,
    /// Attached public gateway identifier.
    pub public_gateway: String,
    /// Gateway name.
    pub name: Option<String>,
    /// Gateway status.
    pub status: Option<String>,
    /// Gateway CRN.
    pub crn: Option<String>,
    /// Owning VPC identifier.
    pub vpc: Option<String>,
    /// Zone name.
    pub zone: Option<String>,
    /// Public address of the gateway.
    pub floating_ip: Option<String>,
}

impl AttachmentState {
    fn from_gateway(subnet: &str, gateway: GatewayResponse) -> Self {
        Self {
            id: subnet.to_owned(),
            subnet: subnet.to_owned(),
            public_gateway: gateway.id,
            name: gateway.name,
            status: gateway.status,
            crn: gateway.crn,
            vpc: gateway.vpc.map(|vpc| vpc.id),
            zone: gateway.zone.map(|zone| zone.name),
            floating_ip: gateway.floating_ip.and_then(|ip| ip.address),
        }
    }
}

fn subnet_path(subnet: &str) -> String {
    format!("/subnets/{subnet}")
}

fn attachment_path(subnet: &str) -> String {
    format!("/subnets/{subnet}/public_gateway")
}

/// Subnet public gateway attachment lifecycle.
#[derive(Clone, Debug)]
pub struct SubnetPublicGatewayAttachments {
    client: VpcClient,
}

impl SubnetPublicGatewayAttachments {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    async fn await_subnet(
        &self,
        action: &'static str,
        subnet: &str,
        timeout: Duration,
    ) -> Result<(), VpcError> {
        Operation::new(action, KIND, subnet)
            .settle_present::<SubnetResponse>(
                &self.client,
                &subnet_path(subnet),
                SUBNET_AVAILABLE,
                timeout,
            )
            .await
            .map(|_| ())
    }

    async fn attach(
        &self,
        action: &'static str,
        config: &AttachmentConfig,
        timeout: Duration,
    ) -> Result<AttachmentState, VpcError> {
        require(&config.subnet, "subnet")?;
        require(&config.public_gateway, "public_gateway")?;
        info!(subnet = %config.subnet, gateway = %config.public_gateway, "attaching public gateway");
        let gateway: GatewayResponse = self
            .client
            .put_json(
                &attachment_path(&config.subnet),
                &ById {
                    id: &config.public_gateway,
                },
            )
            .await?;
        self.await_subnet(action, &config.subnet, timeout).await?;
        Ok(AttachmentState::from_gateway(&config.subnet, gateway))
    }

    async fn read_attachment(&self, subnet: &str) -> Result<Option<AttachmentState>, VpcError> {
        let found = absent_on_not_found(
            self.client
                .get_json::<GatewayResponse>(&attachment_path(subnet))
                .await,
        )?;
        Ok(found.map(|gateway| AttachmentState::from_gateway(subnet, gateway)))
    }

    async fn update_attachment(
        &self,
        id: &str,
        config: &AttachmentConfig,
    ) -> Result<AttachmentState, VpcError> {
        if id != config.subnet {
            return Err(VpcError::Validation(format!(
                "attachment {id} cannot move to subnet {}; recreate it instead",
                config.subnet
            )));
        }
        match self.read_attachment(id).await? {
            Some(current) if current.public_gateway == config.public_gateway => Ok(current),
            _ => {
                self.attach("update", config, self.client.timeouts().update)
                    .await
            }
        }
    }

    async fn detach(&self, subnet: &str) -> Result<(), VpcError> {
        if self.read_attachment(subnet).await?.is_none() {
            info!(subnet, "no public gateway attached");
            return Ok(());
        }
        info!(subnet, "detaching public gateway");
        if absent_on_not_found(self.client.delete(&attachment_path(subnet), None).await)?.is_none()
        {
            return Ok(());
        }
        self.await_subnet("delete", subnet, self.client.timeouts().delete)
            .await
    }
}

impl Resource for SubnetPublicGatewayAttachments {
    type Config = AttachmentConfig;
    type State = AttachmentState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.attach("create", config, self.client.timeouts().create))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_attachment(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_attachment(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.detach(id))
    }
}

#[cfg(test)]
mod tests;
