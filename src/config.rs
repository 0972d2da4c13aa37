//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default IAM token service.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com";
/// API version date sent with every request.
pub const DEFAULT_API_VERSION: &str = "2024-04-30";
/// Default region used to derive the regional endpoint.
pub const DEFAULT_REGION: &str = "us-south";

/// VPC API settings derived from environment variables, configuration files,
/// and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VPCFORM",
    discovery(
        app_name = "vpcform",
        env_var = "VPCFORM_CONFIG_PATH",
        config_file_name = "vpcform.toml",
        dotfile_name = ".vpcform.toml",
        project_file_name = "vpcform.toml"
    )
)]
pub struct VpcConfig {
    /// API key exchanged for a bearer token. This value is required.
    pub api_key: String,
    /// Region whose regional endpoint is used. Defaults to `us-south`.
    #[ortho_config(default = DEFAULT_REGION.to_owned())]
    pub region: String,
    /// Full base URL override, for private endpoints or test servers.
    pub endpoint: Option<String>,
    /// IAM token service base URL.
    #[ortho_config(default = DEFAULT_IAM_ENDPOINT.to_owned())]
    pub iam_endpoint: String,
    /// API version date passed as the `version` query parameter.
    #[ortho_config(default = DEFAULT_API_VERSION.to_owned())]
    pub api_version: String,
    /// Infrastructure generation; only 1 and 2 exist.
    #[ortho_config(default = 2)]
    pub generation: u8,
    /// Fixed delay between lifecycle polls.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for a create to settle.
    #[ortho_config(default = 600)]
    pub create_timeout_secs: u64,
    /// Upper bound on waiting for an update to settle.
    #[ortho_config(default = 600)]
    pub update_timeout_secs: u64,
    /// Upper bound on waiting for a delete to settle.
    #[ortho_config(default = 600)]
    pub delete_timeout_secs: u64,
    /// Per-request HTTP timeout.
    #[ortho_config(default = 60)]
    pub http_timeout_secs: u64,
}

/// Per-operation wait bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeouts {
    /// Create wait bound.
    pub create: Duration,
    /// Update wait bound.
    pub update: Duration,
    /// Delete wait bound.
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let ten_minutes = Duration::from_secs(600);
        Self {
            create: ten_minutes,
            update: ten_minutes,
            delete: ten_minutes,
        }
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to vpcform.toml",
            self.env_var, self.toml_key
        )
    }
}

impl VpcConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("vpcform")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how to
    /// provide values via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("API key", "VPCFORM_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region", "VPCFORM_REGION", "region"),
        )?;
        Self::require_field(
            &self.iam_endpoint,
            &FieldMetadata::new("IAM endpoint", "VPCFORM_IAM_ENDPOINT", "iam_endpoint"),
        )?;
        Self::require_field(
            &self.api_version,
            &FieldMetadata::new("API version date", "VPCFORM_API_VERSION", "api_version"),
        )?;
        if let Some(endpoint) = &self.endpoint {
            Self::require_field(
                endpoint,
                &FieldMetadata::new("endpoint override", "VPCFORM_ENDPOINT", "endpoint"),
            )?;
        }
        if !matches!(self.generation, 1 | 2) {
            let metadata =
                FieldMetadata::new("generation", "VPCFORM_GENERATION", "generation");
            return Err(ConfigError::Invalid(format!(
                "generation must be 1 or 2, got {}: {}",
                self.generation,
                metadata.hint()
            )));
        }
        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "VPCFORM_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            self.create_timeout_secs,
            &FieldMetadata::new(
                "create timeout",
                "VPCFORM_CREATE_TIMEOUT_SECS",
                "create_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.update_timeout_secs,
            &FieldMetadata::new(
                "update timeout",
                "VPCFORM_UPDATE_TIMEOUT_SECS",
                "update_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.delete_timeout_secs,
            &FieldMetadata::new(
                "delete timeout",
                "VPCFORM_DELETE_TIMEOUT_SECS",
                "delete_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.http_timeout_secs,
            &FieldMetadata::new(
                "HTTP timeout",
                "VPCFORM_HTTP_TIMEOUT_SECS",
                "http_timeout_secs",
            ),
        )?;
        Ok(())
    }

    /// Base URL of the VPC API, honouring the endpoint override.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.endpoint.as_ref().map_or_else(
            || format!("https://{}.iaas.cloud.ibm.com/v1", self.region),
            |endpoint| endpoint.trim_end_matches('/').to_owned(),
        )
    }

    /// Fixed delay between lifecycle polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Per-operation wait bounds.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: Duration::from_secs(self.create_timeout_secs),
            update: Duration::from_secs(self.update_timeout_secs),
            delete: Duration::from_secs(self.delete_timeout_secs),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value outside its accepted range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
