//! Error types for the VPC client and resource lifecycles.

use thiserror::Error;

use crate::config::ConfigError;
use crate::wait::NotFoundSignal;

/// Errors raised while talking to the VPC API or driving a resource.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VpcError {
    /// Raised when client configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised before any remote call when a resource configuration is
    /// malformed or self-contradictory.
    #[error("invalid resource configuration: {0}")]
    Validation(String),
    /// Raised when the API key cannot be exchanged for a token.
    #[error("authentication failed: {message}")]
    Auth {
        /// Reason reported by the token service.
        message: String,
    },
    /// Raised when the HTTP request itself fails.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying client error.
        message: String,
    },
    /// Raised for any non-success status other than 404.
    #[error("API returned status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// First error message from the response envelope, or the raw body.
        message: String,
    },
    /// Raised when the API answers 404.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Collection or kind of the missing resource.
        resource: String,
        /// Identifier of the missing resource.
        id: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error.
        message: String,
    },
    /// Raised when a composite identifier has the wrong shape.
    #[error("invalid identifier '{id}': expected {expected}")]
    InvalidId {
        /// Identifier supplied by the caller.
        id: String,
        /// Human description of the expected shape.
        expected: String,
    },
    /// Raised when a lifecycle wait exceeds its bound.
    #[error("timeout waiting for {action} on {resource} {id}")]
    Timeout {
        /// Operation being waited on.
        action: String,
        /// Resource kind.
        resource: String,
        /// Resource identifier.
        id: String,
    },
    /// Raised when the API reports a failure lifecycle state.
    #[error("{action} of {resource} {id} failed with state {state}")]
    Failed {
        /// Operation being waited on.
        action: String,
        /// Resource kind.
        resource: String,
        /// Resource identifier.
        id: String,
        /// Failure state reported by the API.
        state: String,
    },
    /// Raised when the API reports a lifecycle state the wait does not know.
    #[error("{action} of {resource} {id} reached unexpected state {state}")]
    UnexpectedState {
        /// Operation being waited on.
        action: String,
        /// Resource kind.
        resource: String,
        /// Resource identifier.
        id: String,
        /// State reported by the API.
        state: String,
    },
}

impl VpcError {
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(err: &serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }

    /// Builds a not-found error from a request path such as
    /// `/vpn_servers/r006-1`.
    pub(crate) fn not_found_at(path: &str) -> Self {
        let trimmed = path.trim_matches('/');
        let mut segments = trimmed.rsplit('/');
        let id = segments.next().unwrap_or(trimmed);
        let resource = segments.next().unwrap_or("resource");
        Self::NotFound {
            resource: resource.to_owned(),
            id: id.to_owned(),
        }
    }
}

impl NotFoundSignal for VpcError {
    fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ConfigError> for VpcError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
