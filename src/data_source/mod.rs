//! Read-only projections over listed resources.
//!
//! Listings are fetched in full and filtered locally by exact name and, for
//! kinds that carry user tags, by tag.

use tracing::debug;

use crate::resource::backup_policy::{BackupPolicies, BackupPolicyState};
use crate::resource::floating_ip::{FloatingIpState, FloatingIps};
use crate::resource::public_gateway::{PublicGatewayState, PublicGateways};
use crate::resource::security_group_rule::{SecurityGroupRuleState, SecurityGroupRules};
use crate::resource::vpn_server::{VpnServerState, VpnServers};
use crate::vpc::{VpcClient, VpcError};

/// Local filter applied to a listing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Filter {
    /// Exact name to match.
    pub name: Option<String>,
    /// User tag the resource must carry.
    pub tag: Option<String>,
}

impl Filter {
    /// Filter matching a single name.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            tag: None,
        }
    }

    /// Adds a tag requirement.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn apply<T: Tagged>(&self, kind: &str, items: Vec<T>) -> Result<Vec<T>, VpcError> {
        if self.tag.is_some() && !T::TAGGED {
            return Err(VpcError::Validation(format!(
                "{kind} does not support tag filtering"
            )));
        }
        let total = items.len();
        let kept: Vec<T> = items.into_iter().filter(|item| self.matches(item)).collect();
        debug!(kind, total, kept = kept.len(), "filtered listing");
        Ok(kept)
    }

    fn matches<T: Tagged>(&self, item: &T) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|wanted| item.name() == Some(wanted));
        let tag_ok = self
            .tag
            .as_deref()
            .is_none_or(|wanted| item.tags().iter().any(|tag| tag == wanted));
        name_ok && tag_ok
    }
}

/// Listed state that can be matched by name and tag.
pub trait Tagged {
    /// Whether the kind carries user tags.
    const TAGGED: bool = false;

    /// Resource name, when it has one.
    fn name(&self) -> Option<&str>;

    /// User tags on the resource.
    fn tags(&self) -> &[String] {
        &[]
    }
}

impl Tagged for VpnServerState {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Tagged for FloatingIpState {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Tagged for PublicGatewayState {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Tagged for BackupPolicyState {
    const TAGGED: bool = true;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.match_user_tags
    }
}

fn single<T>(kind: &str, name: &str, mut matches: Vec<T>) -> Result<T, VpcError> {
    match matches.len() {
        1 => matches.pop().ok_or_else(|| VpcError::NotFound {
            resource: kind.to_owned(),
            id: name.to_owned(),
        }),
        0 => Err(VpcError::NotFound {
            resource: kind.to_owned(),
            id: name.to_owned(),
        }),
        count => Err(VpcError::Validation(format!(
            "{count} {kind} resources are named {name}"
        ))),
    }
}

/// Read-only lookups against the VPC API.
#[derive(Clone, Debug)]
pub struct DataSource {
    client: VpcClient,
}

impl DataSource {
    /// Creates a data source over `client`.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    /// Lists VPN servers matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when listing fails or a tag filter is given.
    pub async fn vpn_servers(&self, filter: &Filter) -> Result<Vec<VpnServerState>, VpcError> {
        let all = VpnServers::new(self.client.clone()).list().await?;
        filter.apply("vpn_server", all)
    }

    /// Finds the VPN server called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] when no server has that name.
    pub async fn vpn_server(&self, name: &str) -> Result<VpnServerState, VpcError> {
        let found = self.vpn_servers(&Filter::by_name(name)).await?;
        single("vpn_server", name, found)
    }

    /// Lists floating IPs matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when listing fails or a tag filter is given.
    pub async fn floating_ips(&self, filter: &Filter) -> Result<Vec<FloatingIpState>, VpcError> {
        let all = FloatingIps::new(self.client.clone()).list().await?;
        filter.apply("floating_ip", all)
    }

    /// Finds the floating IP called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] when no floating IP has that name.
    pub async fn floating_ip(&self, name: &str) -> Result<FloatingIpState, VpcError> {
        let found = self.floating_ips(&Filter::by_name(name)).await?;
        single("floating_ip", name, found)
    }

    /// Lists public gateways matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when listing fails or a tag filter is given.
    pub async fn public_gateways(
        &self,
        filter: &Filter,
    ) -> Result<Vec<PublicGatewayState>, VpcError> {
        let all = PublicGateways::new(self.client.clone()).list().await?;
        filter.apply("public_gateway", all)
    }

    /// Finds the public gateway called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] when no gateway has that name.
    pub async fn public_gateway(&self, name: &str) -> Result<PublicGatewayState, VpcError> {
        let found = self.public_gateways(&Filter::by_name(name)).await?;
        single("public_gateway", name, found)
    }

    /// Lists backup policies matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when listing fails.
    pub async fn backup_policies(
        &self,
        filter: &Filter,
    ) -> Result<Vec<BackupPolicyState>, VpcError> {
        let all = BackupPolicies::new(self.client.clone()).list().await?;
        filter.apply("backup_policy", all)
    }

    /// Finds the backup policy called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::NotFound`] when no policy has that name.
    pub async fn backup_policy(&self, name: &str) -> Result<BackupPolicyState, VpcError> {
        let found = self.backup_policies(&Filter::by_name(name)).await?;
        single("backup_policy", name, found)
    }

    /// Lists the rules of security group `group`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when listing fails; a missing group is
    /// [`VpcError::NotFound`].
    pub async fn security_group_rules(
        &self,
        group: &str,
    ) -> Result<Vec<SecurityGroupRuleState>, VpcError> {
        SecurityGroupRules::new(self.client.clone()).list(group).await
    }
}
