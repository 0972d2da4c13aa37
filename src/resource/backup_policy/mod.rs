//! Backup policies selecting resources by user tag.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, non_blank};
use crate::vpc::types::{ById, Reference};
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{BACKUP_POLICY_DELETED, BACKUP_POLICY_STABLE};

const KIND: &str = "backup_policy";

/// Collection path for backup policies.
pub(crate) const COLLECTION_PATH: &str = "/backup_policies";

fn default_resource_type() -> String {
    String::from("volume")
}

/// Declarative configuration of a backup policy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BackupPolicyConfig {
    /// User tags a resource must carry to be backed up.
    pub match_user_tags: Vec<String>,
    /// `volume` or `instance`.
    #[serde(default = "default_resource_type")]
    pub match_resource_type: String,
    /// Policy name.
    #[serde(default)]
    pub name: Option<String>,
    /// Resource group identifier.
    #[serde(default)]
    pub resource_group: Option<String>,
}

impl BackupPolicyConfig {
    /// Checks local consistency.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError::Validation`] when no tag is given or the resource
    /// type is unknown.
    pub fn validate(&self) -> Result<(), VpcError> {
        if self.match_user_tags.iter().all(|tag| tag.trim().is_empty()) {
            return Err(VpcError::Validation(String::from(
                "at least one match_user_tags entry is required",
            )));
        }
        match self.match_resource_type.as_str() {
            "volume" | "instance" => Ok(()),
            other => Err(VpcError::Validation(format!(
                "match_resource_type must be volume or instance, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct BackupPolicyPrototype<'a> {
    match_user_tags: &'a [String],
    match_resource_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_group: Option<ById<'a>>,
}

#[derive(Debug, Serialize)]
struct BackupPolicyPatch<'a> {
    match_user_tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct BackupPolicyResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    lifecycle_state: String,
    #[serde(default)]
    health_state: Option<String>,
    #[serde(default)]
    match_user_tags: Vec<String>,
    #[serde(default)]
    match_resource_type: Option<String>,
    #[serde(default)]
    crn: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    last_job_completed_at: Option<String>,
    #[serde(default)]
    resource_group: Option<Reference>,
    #[serde(default)]
    plans: Vec<Reference>,
}

impl HasLifecycle for BackupPolicyResponse {
    fn lifecycle_state(&self) -> &str {
        &self.lifecycle_state
    }
}

/// Flat state of a backup policy.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BackupPolicyState {
    /// Policy identifier.
    pub id: String,
    /// Policy name.
    pub name: Option<String>,
    /// Lifecycle state.
    pub lifecycle_state: String,
    /// Health state.
    pub health_state: Option<String>,
    /// Tags selecting backed-up resources.
    pub match_user_tags: Vec<String>,
    /// Selected resource type.
    pub match_resource_type: Option<String>,
    /// Cloud resource name.
    pub crn: Option<String>,
    /// Canonical URL.
    pub href: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Completion time of the last backup job.
    pub last_job_completed_at: Option<String>,
    /// Resource group identifier.
    pub resource_group: Option<String>,
    /// Plans attached to the policy.
    pub plans: Vec<Reference>,
}

impl From<BackupPolicyResponse> for BackupPolicyState {
    fn from(response: BackupPolicyResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            lifecycle_state: response.lifecycle_state,
            health_state: response.health_state,
            match_user_tags: response.match_user_tags,
            match_resource_type: response.match_resource_type,
            crn: response.crn,
            href: response.href,
            created_at: response.created_at,
            last_job_completed_at: response.last_job_completed_at,
            resource_group: response.resource_group.map(|group| group.id),
            plans: response.plans,
        }
    }
}

fn policy_path(id: &str) -> String {
    format!("{COLLECTION_PATH}/{id}")
}

/// Backup policy lifecycle.
#[derive(Clone, Debug)]
pub struct BackupPolicies {
    client: VpcClient,
}

impl BackupPolicies {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    /// Lists every backup policy.
    ///
    /// # Errors
    ///
    /// Returns [`VpcError`] when the listing fails.
    pub async fn list(&self) -> Result<Vec<BackupPolicyState>, VpcError> {
        let found: Vec<BackupPolicyResponse> = self
            .client
            .list_all(COLLECTION_PATH, "backup_policies", &[])
            .await?;
        Ok(found.into_iter().map(BackupPolicyState::from).collect())
    }

    async fn await_stable(
        &self,
        action: &'static str,
        id: &str,
        timeout: Duration,
    ) -> Result<BackupPolicyState, VpcError> {
        let settled: BackupPolicyResponse = Operation::new(action, KIND, id)
            .settle_present(&self.client, &policy_path(id), BACKUP_POLICY_STABLE, timeout)
            .await?;
        Ok(settled.into())
    }

    async fn create_policy(
        &self,
        config: &BackupPolicyConfig,
    ) -> Result<BackupPolicyState, VpcError> {
        config.validate()?;
        let body = BackupPolicyPrototype {
            match_user_tags: &config.match_user_tags,
            match_resource_type: &config.match_resource_type,
            name: non_blank(config.name.as_deref()),
            resource_group: non_blank(config.resource_group.as_deref()).map(|id| ById { id }),
        };
        info!(tags = ?config.match_user_tags, "creating backup policy");
        let created: BackupPolicyResponse = self.client.post_json(COLLECTION_PATH, &body).await?;
        self.await_stable("create", &created.id, self.client.timeouts().create)
            .await
    }

    async fn read_policy(&self, id: &str) -> Result<Option<BackupPolicyState>, VpcError> {
        let found = absent_on_not_found(
            self.client
                .get_json::<BackupPolicyResponse>(&policy_path(id))
                .await,
        )?;
        Ok(found.map(BackupPolicyState::from))
    }

    async fn update_policy(
        &self,
        id: &str,
        config: &BackupPolicyConfig,
    ) -> Result<BackupPolicyState, VpcError> {
        config.validate()?;
        let path = policy_path(id);
        let (current, etag) = self
            .client
            .get_json_with_etag::<BackupPolicyResponse>(&path)
            .await?;
        if current
            .match_resource_type
            .as_deref()
            .is_some_and(|kind| kind != config.match_resource_type)
        {
            return Err(VpcError::Validation(format!(
                "backup policy {id} matches {}; recreate it to match {}",
                current.match_resource_type.unwrap_or_default(),
                config.match_resource_type
            )));
        }
        let body = BackupPolicyPatch {
            match_user_tags: &config.match_user_tags,
            name: non_blank(config.name.as_deref()),
        };
        info!(id, "updating backup policy");
        let _: BackupPolicyResponse = self
            .client
            .patch_json(&path, &body, etag.as_ref())
            .await?;
        self.await_stable("update", id, self.client.timeouts().update)
            .await
    }

    async fn delete_policy(&self, id: &str) -> Result<(), VpcError> {
        let path = policy_path(id);
        let Some((_, etag)) = absent_on_not_found(
            self.client
                .get_json_with_etag::<BackupPolicyResponse>(&path)
                .await,
        )?
        else {
            info!(id, "backup policy already absent");
            return Ok(());
        };
        info!(id, "deleting backup policy");
        if absent_on_not_found(self.client.delete(&path, etag.as_ref()).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<BackupPolicyResponse>(
                &self.client,
                &path,
                BACKUP_POLICY_DELETED,
                self.client.timeouts().delete,
            )
            .await
            .map(|_| ())
    }
}

impl Resource for BackupPolicies {
    type Config = BackupPolicyConfig;
    type State = BackupPolicyState;

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
