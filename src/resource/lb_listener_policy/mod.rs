//! Load balancer listener policies.
//!
//! Identifiers are composite: `{lb}/{listener}/{policy}`. The load balancer
//! only accepts one configuration change at a time, so every mutation holds
//! the load balancer's keyed lock and first waits for it to be `active`.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, compose_id, non_blank,
    require, split_id,
};
use crate::mutex_kv::MutexKv;
use crate::vpc::types::{ById, Reference};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{
    LB_LISTENER_POLICY_ACTIVE, LB_LISTENER_POLICY_DELETED, LOAD_BALANCER_ACTIVE,
};

const KIND: &str = "lb_listener_policy";
const ID_SEPARATOR: char = '/';
const PRIORITY_RANGE: RangeInclusive<u8> = 1..=10;

/// Name of the keyed lock guarding mutations on load balancer `lb`.
#[must_use]
pub fn lock_key(lb: &str) -> String {
    format!("load_balancer_key_{lb}")
}

/// What a policy does with matching traffic.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Send to a pool.
    Forward,
    /// Answer with a redirect to a URL.
    Redirect,
    /// Drop the request.
    Reject,
    /// Redirect to an HTTPS listener.
    HttpsRedirect,
}

impl PolicyAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Redirect => "redirect",
            Self::Reject => "reject",
            Self::HttpsRedirect => "https_redirect",
        }
    }
}

/// A rule matched against incoming requests.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// `contains`, `equals` or `matches_regex`.
    pub condition: String,
    /// `header`, `hostname`, `path`, `query` or `body`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Value compared against.
    pub value: String,
    /// Header or query field name, for rule types that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Declarative configuration of a listener policy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ListenerPolicyConfig {
    /// Load balancer identifier.
    pub lb: String,
    /// Listener identifier; `lb/listener` is accepted too.
    pub listener: String,
    /// Action taken on match.
    pub action: PolicyAction,
    /// Evaluation priority, 1 to 10.
    pub priority: u8,
    /// Policy name.
    #[serde(default)]
    pub name: Option<String>,
    /// Match rules; only applied at creation.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Pool to forward to; `lb/pool` is accepted too.
    #[serde(default)]
    pub target_id: Option<String>,
    /// Redirect status code.
    #[serde(default)]
    pub target_http_status_code: Option<u16>,
    /// Redirect URL.
    #[serde(default)]
    pub target_url: Option<String>,
    /// HTTPS listener to redirect to.
    #[serde(default)]
    pub target_https_redirect_listener: Option<String>,
    /// HTTPS redirect status code.
    #[serde(default)]
    pub target_https_redirect_status_code: Option<u16>,
    /// HTTPS redirect URI.
    #[serde(default)]
    pub target_https_redirect_uri: Option<String>,
}

/// Where matching traffic goes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyTarget {
    /// Forward to a pool.
    Pool {
        /// Pool identifier.
        id: String,
    },
    /// Redirect to a URL.
    RedirectUrl {
        /// Status code returned to the client.
        http_status_code: u16,
        /// Redirect location.
        url: String,
    },
    /// Redirect to an HTTPS listener.
    HttpsRedirect {
        /// Status code returned to the client.
        http_status_code: u16,
        /// Listener identifier.
        listener: String,
        /// Optional URI to redirect to.
        uri: Option<String>,
    },
}

/// Keeps the last `/`-separated segment of `value`.
fn last_segment(value: &str) -> &str {
    value.rsplit(ID_SEPARATOR).next().unwrap_or(value)
}

impl ListenerPolicyConfig {
    /// Listener identifier without a load balancer prefix.
    #[must_use]
    pub fn listener_id(&self) -> &str {
        last_segment(&self.listener)
    }

    /// Validates the configuration and resolves its target.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Validation`] for a priority outside 1..=10 or a
    /// target that does not fit the action.
    pub fn target(&self) -> Result<Option<PolicyTarget>, VpcError> {
        require(&self.lb, "lb")?;
        require(&self.listener, "listener")?;
        if !PRIORITY_RANGE.contains(&self.priority) {
            return Err(VpcError::Validation(format!(
                "priority must be between 1 and 10, got {}",
                self.priority
            )));
        }
        let missing = |field: &str| {
            VpcError::Validation(format!(
                "when action is {} please specify {field}",
                self.action.as_str()
            ))
        };
        match self.action {
            PolicyAction::Forward => {
                let id = non_blank(self.target_id.as_deref())
                    .ok_or_else(|| missing("target_id"))?;
                Ok(Some(PolicyTarget::Pool {
                    id: last_segment(id).to_owned(),
                }))
            }
            PolicyAction::Redirect => Ok(Some(PolicyTarget::RedirectUrl {
                http_status_code: self
                    .target_http_status_code
                    .ok_or_else(|| missing("target_http_status_code"))?,
                url: non_blank(self.target_url.as_deref())
                    .ok_or_else(|| missing("target_url"))?
                    .to_owned(),
            })),
            PolicyAction::HttpsRedirect => Ok(Some(PolicyTarget::HttpsRedirect {
                http_status_code: self
                    .target_https_redirect_status_code
                    .ok_or_else(|| missing("target_https_redirect_status_code"))?,
                listener: non_blank(self.target_https_redirect_listener.as_deref())
                    .map(last_segment)
                    .ok_or_else(|| missing("target_https_redirect_listener"))?
                    .to_owned(),
                uri: non_blank(self.target_https_redirect_uri.as_deref()).map(str::to_owned),
            })),
            PolicyAction::Reject => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PoolTargetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RedirectTargetResponse {
    http_status_code: u16,
    url: String,
}

#[derive(Debug, Deserialize)]
struct HttpsRedirectTargetResponse {
    http_status_code: u16,
    listener: Reference,
    #[serde(default)]
    uri: Option<String>,
}

impl PolicyTarget {
    /// Decodes the response `target` of a settled policy for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Decode`] when the target does not have the shape
    /// the action implies.
    pub fn from_response(
        action: PolicyAction,
        target: Option<&Value>,
    ) -> Result<Option<Self>, VpcError> {
        let Some(raw) = target.filter(|value| !value.is_null()) else {
            return match action {
                PolicyAction::Reject => Ok(None),
                other => Err(VpcError::Decode {
                    message: format!("{} policy has no target", other.as_str()),
                }),
            };
        };
        let decoded = match action {
            PolicyAction::Forward => serde_json::from_value::<PoolTargetResponse>(raw.clone())
                .map(|pool| Self::Pool { id: pool.id }),
            PolicyAction::Redirect => serde_json::from_value::<RedirectTargetResponse>(raw.clone())
                .map(|redirect| Self::RedirectUrl {
                    http_status_code: redirect.http_status_code,
                    url: redirect.url,
                }),
            PolicyAction::HttpsRedirect => {
                serde_json::from_value::<HttpsRedirectTargetResponse>(raw.clone()).map(|https| {
                    Self::HttpsRedirect {
                        http_status_code: https.http_status_code,
                        listener: https.listener.id,
                        uri: https.uri,
                    }
                })
            }
            PolicyAction::Reject => return Ok(None),
        };
        decoded.map(Some).map_err(|err| VpcError::decode(&err))
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TargetBody<'a> {
    Pool {
        id: &'a str,
    },
    RedirectUrl {
        http_status_code: u16,
        url: &'a str,
    },
    HttpsRedirect {
        http_status_code: u16,
        listener: ById<'a>,
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<&'a str>,
    },
}

impl<'a> From<&'a PolicyTarget> for TargetBody<'a> {
    fn from(target: &'a PolicyTarget) -> Self {
        match target {
            PolicyTarget::Pool { id } => Self::Pool { id },
            PolicyTarget::RedirectUrl {
                http_status_code,
                url,
            } => Self::RedirectUrl {
                http_status_code: *http_status_code,
                url,
            },
            PolicyTarget::HttpsRedirect {
                http_status_code,
                listener,
                uri,
            } => Self::HttpsRedirect {
                http_status_code: *http_status_code,
                listener: ById { id: listener },
                uri: uri.as_deref(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PolicyPrototype<'a> {
    action: PolicyAction,
    priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rules: &'a Vec<PolicyRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<TargetBody<'a>>,
}

#[derive(Debug, Serialize)]
struct PolicyPatch<'a> {
    priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<TargetBody<'a>>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerResponse {
    provisioning_status: String,
}

impl HasLifecycle for LoadBalancerResponse {
    fn lifecycle_state(&self) -> &str {
        &self.provisioning_status
    }
}

#[derive(Debug, Deserialize)]
struct RuleResponse {
    id: String,
    condition: String,
    #[serde(rename = "type")]
    rule_type: String,
    value: String,
    #[serde(default)]
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolicyResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    action: PolicyAction,
    priority: u8,
    provisioning_status: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    rules: Vec<RuleResponse>,
    #[serde(default)]
    target: Option<Value>,
}

impl HasLifecycle for PolicyResponse {
    fn lifecycle_state(&self) -> &str {
        &self.provisioning_status
    }
}

/// A rule as reported back by the API.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PolicyRuleState {
    /// Rule identifier.
    pub rule_id: String,
    /// Match condition.
    pub condition: String,
    /// Rule type.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Compared value.
    pub value: String,
    /// Field name, when present.
    pub field: Option<String>,
}

/// Flat state of a listener policy.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ListenerPolicyState {
    /// Composite identifier `lb/listener/policy`.
    pub id: String,
    /// Load balancer identifier.
    pub lb: String,
    /// Listener identifier.
    pub listener: String,
    /// Policy identifier.
    pub policy_id: String,
    /// Policy name.
    pub name: Option<String>,
    /// Action on match.
    pub action: PolicyAction,
    /// Evaluation priority.
    pub priority: u8,
    /// Provisioning status.
    pub provisioning_status: String,
    /// Canonical URL.
    pub href: Option<String>,
    /// Match rules.
    pub rules: Vec<PolicyRuleState>,
    /// Decoded target.
    pub target: Option<PolicyTarget>,
    /// Pool identifier for `forward`.
    pub target_id: Option<String>,
    /// Status code for `redirect`.
    pub target_http_status_code: Option<u16>,
    /// URL for `redirect`.
    pub target_url: Option<String>,
    /// Listener for `https_redirect`.
    pub target_https_redirect_listener: Option<String>,
    /// Status code for `https_redirect`.
    pub target_https_redirect_status_code: Option<u16>,
    /// URI for `https_redirect`.
    pub target_https_redirect_uri: Option<String>,
}

impl ListenerPolicyState {
    fn from_response(lb: &str, listener: &str, response: PolicyResponse) -> Result<Self, VpcError> {
        let target = PolicyTarget::from_response(response.action, response.target.as_ref())?;
        let mut state = Self {
            id: compose_id(&[lb, listener, &response.id], ID_SEPARATOR),
            lb: lb.to_owned(),
            listener: listener.to_owned(),
            policy_id: response.id,
            name: response.name,
            action: response.action,
            priority: response.priority,
            provisioning_status: response.provisioning_status,
            href: response.href,
            rules: response
                .rules
                .into_iter()
                .map(|rule| PolicyRuleState {
                    rule_id: rule.id,
                    condition: rule.condition,
                    rule_type: rule.rule_type,
                    value: rule.value,
                    field: rule.field,
                })
                .collect(),
            target: None,
            target_id: None,
            target_http_status_code: None,
            target_url: None,
            target_https_redirect_listener: None,
            target_https_redirect_status_code: None,
            target_https_redirect_uri: None,
        };
        match &target {
            Some(PolicyTarget::Pool { id }) => state.target_id = Some(id.clone()),
            Some(PolicyTarget::RedirectUrl {
                http_status_code,
                url,
            }) => {
                state.target_http_status_code = Some(*http_status_code);
                state.target_url = Some(url.clone());
            }
            Some(PolicyTarget::HttpsRedirect {
                http_status_code,
                listener: redirect_listener,
                uri,
            }) => {
                state.target_https_redirect_status_code = Some(*http_status_code);
                state.target_https_redirect_listener = Some(redirect_listener.clone());
                state.target_https_redirect_uri.clone_from(uri);
            }
            None => {}
        }
        state.target = target;
        Ok(state)
    }
}

fn load_balancer_path(lb: &str) -> String {
    format!("/load_balancers/{lb}")
}

fn policies_path(lb: &str, listener: &str) -> String {
    format!("/load_balancers/{lb}/listeners/{listener}/policies")
}

fn policy_path(lb: &str, listener: &str, policy: &str) -> String {
    format!("{}/{policy}", policies_path(lb, listener))
}

/// Listener policy lifecycle.
#[derive(Clone, Debug)]
pub struct ListenerPolicies {
    client: VpcClient,
    locks: &'static MutexKv,
}

impl ListenerPolicies {
    /// Creates the resource using the process-wide lock registry.
    #[must_use]
    pub fn new(client: VpcClient) -> Self {
        Self {
            client,
            locks: MutexKv::global(),
        }
    }

    /// Replaces the lock registry.
    #[must_use]
    pub const fn with_locks(mut self, locks: &'static MutexKv) -> Self {
        self.locks = locks;
        self
    }

    async fn await_load_balancer(
        &self,
        action: &'static str,
        lb: &str,
        timeout: Duration,
    ) -> Result<(), VpcError> {
        Operation::new(action, "load_balancer", lb)
            .settle_present::<LoadBalancerResponse>(
                &self.client,
                &load_balancer_path(lb),
                LOAD_BALANCER_ACTIVE,
                timeout,
            )
            .await
            .map(|_| ())
    }

    async fn create_policy(
        &self,
        config: &ListenerPolicyConfig,
    ) -> Result<ListenerPolicyState, VpcError> {
        let target = config.target()?;
        let listener = config.listener_id();
        let timeout = self.client.timeouts().create;
        let body = PolicyPrototype {
            action: config.action,
            priority: config.priority,
            name: non_blank(config.name.as_deref()),
            rules: &config.rules,
            target: target.as_ref().map(TargetBody::from),
        };

        let _guard = self.locks.lock(&lock_key(&config.lb)).await;
        self.await_load_balancer("create", &config.lb, timeout).await?;
        info!(
            lb = %config.lb,
            listener,
            action = config.action.as_str(),
            "creating listener policy"
        );
        let created: PolicyResponse = self
            .client
            .post_json(&policies_path(&config.lb, listener), &body)
            .await?;
        let id = compose_id(&[&config.lb, listener, &created.id], ID_SEPARATOR);
        let settled: PolicyResponse = Operation::new("create", KIND, &id)
            .settle_present(
                &self.client,
                &policy_path(&config.lb, listener, &created.id),
                LB_LISTENER_POLICY_ACTIVE,
                timeout,
            )
            .await?;
        ListenerPolicyState::from_response(&config.lb, listener, settled)
    }

    async fn read_policy(&self, id: &str) -> Result<Option<ListenerPolicyState>, VpcError> {
        let [lb, listener, policy] = split_id::<3>(id, ID_SEPARATOR)?;
        absent_on_not_found(
            self.client
                .get_json::<PolicyResponse>(&policy_path(lb, listener, policy))
                .await,
        )?
        .map(|response| ListenerPolicyState::from_response(lb, listener, response))
        .transpose()
    }

    async fn update_policy(
        &self,
        id: &str,
        config: &ListenerPolicyConfig,
    ) -> Result<ListenerPolicyState, VpcError> {
        let [lb, listener, policy] = split_id::<3>(id, ID_SEPARATOR)?;
        if lb != config.lb || listener != config.listener_id() {
            return Err(VpcError::Validation(format!(
                "policy {id} cannot move to another load balancer or listener; recreate it instead"
            )));
        }
        let target = config.target()?;
        let body = PolicyPatch {
            priority: config.priority,
            name: non_blank(config.name.as_deref()),
            target: target.as_ref().map(TargetBody::from),
        };
        let timeout = self.client.timeouts().update;
        let path = policy_path(lb, listener, policy);

        let _guard = self.locks.lock(&lock_key(lb)).await;
        self.await_load_balancer("update", lb, timeout).await?;
        info!(id, "updating listener policy");
        let _: PolicyResponse = self.client.patch_json(&path, &body, None).await?;
        let settled: PolicyResponse = Operation::new("update", KIND, id)
            .settle_present(&self.client, &path, LB_LISTENER_POLICY_ACTIVE, timeout)
            .await?;
        ListenerPolicyState::from_response(lb, listener, settled)
    }

    async fn delete_policy(&self, id: &str) -> Result<(), VpcError> {
        let [lb, listener, policy] = split_id::<3>(id, ID_SEPARATOR)?;
        let timeout = self.client.timeouts().delete;
        let path = policy_path(lb, listener, policy);

        let _guard = self.locks.lock(&lock_key(lb)).await;
        if absent_on_not_found(self.client.get_json::<PolicyResponse>(&path).await)?.is_none() {
            info!(id, "listener policy already absent");
            return Ok(());
        }
        self.await_load_balancer("delete", lb, timeout).await?;
        info!(id, "deleting listener policy");
        if absent_on_not_found(self.client.delete(&path, None).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<PolicyResponse>(&self.client, &path, LB_LISTENER_POLICY_DELETED, timeout)
            .await
            .map(|_| ())
    }
}

impl Resource for ListenerPolicies {
    type Config = ListenerPolicyConfig;
    type State = ListenerPolicyState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_policy(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_policy(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_policy(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_policy(id))
    }
}

#[cfg(test)]
mod tests;
