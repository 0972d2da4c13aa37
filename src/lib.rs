//! Core library for the `vpcform` lifecycle driver.
//!
//! The crate manages VPC networking resources through the regional REST API:
//! each resource kind turns a declarative configuration into API calls, waits
//! for the remote object to settle, and reports a flat state. Shared pieces
//! include a polling state waiter, a keyed async mutex for parent-scoped
//! mutations, and read-only data sources over listed resources.

pub mod config;
pub mod data_source;
pub mod manifest;
pub mod mutex_kv;
pub mod remote;
pub mod resource;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod vpc;
pub mod wait;

pub use config::{ConfigError, Timeouts, VpcConfig};
pub use data_source::{DataSource, Filter, Tagged};
pub use manifest::{ManifestError, load_manifest, parse_manifest, read_manifest};
pub use mutex_kv::{KeyGuard, MutexKv};
pub use remote::{RemotePrototype, RemoteRef};
pub use resource::flatten::to_attributes;
pub use resource::{Resource, ResourceFuture, compose_id, split_id};
pub use vpc::{VpcClient, VpcError};
pub use wait::{LifecycleProfile, StateWaiter, WaitError, WaitMode, WaitOutcome, WaitSpec};
