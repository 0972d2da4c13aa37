//! Image export jobs writing an image to object storage.
//!
//! Identifiers are composite: `{image}/{job}`.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    HasLifecycle, Operation, Resource, ResourceFuture, absent_on_not_found, compose_id, non_blank,
    require, split_id,
};
use crate::vpc::types::ByName;
use crate::vpc::{VpcClient, VpcError};
use crate::wait::profiles::{IMAGE_EXPORT_JOB_DELETED, IMAGE_EXPORT_JOB_DONE};

const KIND: &str = "image_export_job";
const ID_SEPARATOR: char = '/';

/// Declarative configuration of an export job.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImageExportJobConfig {
    /// Image to export.
    pub image: String,
    /// Destination bucket name.
    pub storage_bucket: String,
    /// `qcow2` or `vhd`; the API defaults to `qcow2`.
    #[serde(default)]
    pub format: Option<String>,
    /// Job name.
    #[serde(default)]
    pub name: Option<String>,
}

impl ImageExportJobConfig {
    fn validate(&self) -> Result<(), VpcError> {
        require(&self.image, "image")?;
        require(&self.storage_bucket, "storage_bucket")?;
        match self.format.as_deref() {
            None | Some("qcow2" | "vhd") => Ok(()),
            Some(other) => Err(VpcError::Validation(format!(
                "format must be qcow2 or vhd, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportJobPrototype<'a> {
    storage_bucket: ByName<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ExportJobPatch<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct BucketResponse {
    name: String,
    #[serde(default)]
    crn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusReason {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExportJobResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
    status: String,
    #[serde(default)]
    status_reasons: Vec<StatusReason>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    storage_bucket: Option<BucketResponse>,
    #[serde(default)]
    storage_href: Option<String>,
    #[serde(default)]
    storage_object: Option<ObjectResponse>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
}

impl HasLifecycle for ExportJobResponse {
    fn lifecycle_state(&self) -> &str {
        &self.status
    }
}

/// Flat state of an export job.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ImageExportJobState {
    /// Composite identifier `image/job`.
    pub id: String,
    /// Exported image.
    pub image: String,
    /// Job identifier.
    pub image_export_job: String,
    /// Job name.
    pub name: Option<String>,
    /// Job status.
    pub status: String,
    /// Reasons for the current status, as `code: message`.
    pub status_reasons: Vec<String>,
    /// Export format.
    pub format: Option<String>,
    /// Canonical URL.
    pub href: Option<String>,
    /// Destination bucket name.
    pub storage_bucket: Option<String>,
    /// Destination bucket CRN.
    pub storage_bucket_crn: Option<String>,
    /// Object storage URL of the exported image.
    pub storage_href: Option<String>,
    /// Object name in the bucket.
    pub storage_object: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Start timestamp.
    pub started_at: Option<String>,
    /// Completion timestamp.
    pub completed_at: Option<String>,
}

impl ImageExportJobState {
    fn from_response(image: &str, response: ExportJobResponse) -> Self {
        let (storage_bucket, storage_bucket_crn) = response
            .storage_bucket
            .map_or((None, None), |bucket| (Some(bucket.name), bucket.crn));
        Self {
            id: compose_id(&[image, &response.id], ID_SEPARATOR),
            image: image.to_owned(),
            image_export_job: response.id,
            name: response.name,
            status: response.status,
            status_reasons: response
                .status_reasons
                .into_iter()
                .map(|reason| format!("{}: {}", reason.code, reason.message))
                .collect(),
            format: response.format,
            href: response.href,
            storage_bucket,
            storage_bucket_crn,
            storage_href: response.storage_href,
            storage_object: response.storage_object.map(|object| object.name),
            created_at: response.created_at,
            started_at: response.started_at,
            completed_at: response.completed_at,
        }
    }
}

fn jobs_path(image: &str) -> String {
    format!("/images/{image}/export_jobs")
}

fn job_path(image: &str, job: &str) -> String {
    format!("{}/{job}", jobs_path(image))
}

/// Image export job lifecycle.
#[derive(Clone, Debug)]
pub struct ImageExportJobs {
    client: VpcClient,
}

impl ImageExportJobs {
    /// Creates the resource.
    #[must_use]
    pub const fn new(client: VpcClient) -> Self {
        Self { client }
    }

    async fn create_job(
        &self,
        config: &ImageExportJobConfig,
    ) -> Result<ImageExportJobState, VpcError> {
        config.validate()?;
        let body = ExportJobPrototype {
            storage_bucket: ByName {
                name: &config.storage_bucket,
            },
            format: non_blank(config.format.as_deref()),
            name: non_blank(config.name.as_deref()),
        };
        info!(image = %config.image, bucket = %config.storage_bucket, "starting image export");
        let created: ExportJobResponse = self
            .client
            .post_json(&jobs_path(&config.image), &body)
            .await?;
        let id = compose_id(&[&config.image, &created.id], ID_SEPARATOR);
        let finished: ExportJobResponse = Operation::new("create", KIND, &id)
            .settle_present(
                &self.client,
                &job_path(&config.image, &created.id),
                IMAGE_EXPORT_JOB_DONE,
                self.client.timeouts().create,
            )
            .await?;
        Ok(ImageExportJobState::from_response(&config.image, finished))
    }

    async fn read_job(&self, id: &str) -> Result<Option<ImageExportJobState>, VpcError> {
        let [image, job] = split_id::<2>(id, ID_SEPARATOR)?;
        let found = absent_on_not_found(
            self.client
                .get_json::<ExportJobResponse>(&job_path(image, job))
                .await,
        )?;
        Ok(found.map(|response| ImageExportJobState::from_response(image, response)))
    }

    async fn update_job(
        &self,
        id: &str,
        config: &ImageExportJobConfig,
    ) -> Result<ImageExportJobState, VpcError> {
        let [image, job] = split_id::<2>(id, ID_SEPARATOR)?;
        if image != config.image {
            return Err(VpcError::Validation(format!(
                "export job {id} belongs to image {image}; recreate it to export {}",
                config.image
            )));
        }
        let Some(name) = non_blank(config.name.as_deref()) else {
            return self.read_job(id).await?.ok_or_else(|| VpcError::NotFound {
                resource: String::from(KIND),
                id: id.to_owned(),
            });
        };
        info!(id, name, "renaming image export job");
        let updated: ExportJobResponse = self
            .client
            .patch_json(&job_path(image, job), &ExportJobPatch { name }, None)
            .await?;
        Ok(ImageExportJobState::from_response(image, updated))
    }

    async fn delete_job(&self, id: &str) -> Result<(), VpcError> {
        let [image, job] = split_id::<2>(id, ID_SEPARATOR)?;
        let path = job_path(image, job);
        if absent_on_not_found(self.client.get_json::<ExportJobResponse>(&path).await)?.is_none() {
            info!(id, "image export job already absent");
            return Ok(());
        }
        info!(id, "deleting image export job");
        if absent_on_not_found(self.client.delete(&path, None).await)?.is_none() {
            return Ok(());
        }
        Operation::new("delete", KIND, id)
            .settle::<ExportJobResponse>(
                &self.client,
                &path,
                IMAGE_EXPORT_JOB_DELETED,
                self.client.timeouts().delete,
            )
            .await
            .map(|_| ())
    }
}

impl Resource for ImageExportJobs {
    type Config = ImageExportJobConfig;
    type State = ImageExportJobState;

    const KIND: &'static str = KIND;

    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.create_job(config))
    }

    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>> {
        Box::pin(self.read_job(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State> {
        Box::pin(self.update_job(id, config))
    }

    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()> {
        Box::pin(self.delete_job(id))
    }
}
