//! Lifecycle hooks shared by every managed resource.
//!
//! Each resource turns a declarative configuration into API calls, waits for
//! the remote object to settle, and maps the response back into a flat
//! state. Reads and deletes treat HTTP 404 as "already absent".

pub mod backup_policy;
pub mod flatten;
pub mod floating_ip;
pub mod image_export_job;
pub mod lb_listener_policy;
pub mod public_gateway;
pub mod security_group_rule;
pub mod subnet_public_gateway_attachment;
pub mod vpn_server;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::vpc::{VpcClient, VpcError};
use crate::wait::{
    LifecycleProfile, NotFoundSignal, Observation, StateWaiter, WaitError, WaitOutcome, WaitSpec,
};

pub use crate::config::Timeouts;

/// Boxed future returned by [`Resource`] hooks.
pub type ResourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VpcError>> + Send + 'a>>;

/// Create/read/update/delete/exists hooks for one resource kind.
pub trait Resource: Send + Sync {
    /// Declarative configuration accepted by create and update.
    type Config: DeserializeOwned + Send + Sync;
    /// Flat state produced after every successful operation.
    type State: Serialize + Send;

    /// Kind name used in logs and errors.
    const KIND: &'static str;

    /// Creates the resource and waits until it is usable.
    fn create<'a>(&'a self, config: &'a Self::Config) -> ResourceFuture<'a, Self::State>;

    /// Reads the resource; `Ok(None)` means it no longer exists.
    fn read<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, Option<Self::State>>;

    /// Applies `config` to an existing resource.
    fn update<'a>(
        &'a self,
        id: &'a str,
        config: &'a Self::Config,
    ) -> ResourceFuture<'a, Self::State>;

    /// Deletes the resource; succeeds when it is already gone.
    fn delete<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, ()>;

    /// Reports whether the resource exists.
    fn exists<'a>(&'a self, id: &'a str) -> ResourceFuture<'a, bool> {
        Box::pin(async move { Ok(self.read(id).await?.is_some()) })
    }
}

/// API response types that expose a lifecycle state.
pub trait HasLifecycle {
    /// Current lifecycle or provisioning state.
    fn lifecycle_state(&self) -> &str;
}

/// Joins identifier segments with `separator`.
#[must_use]
pub fn compose_id(segments: &[&str], separator: char) -> String {
    let mut id = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            id.push(separator);
        }
        id.push_str(segment);
    }
    id
}

/// Splits a composite identifier into exactly `N` non-empty segments.
///
/// # Errors
///
/// Returns [`VpcError::InvalidId`] when the segment count differs or any
/// segment is empty.
pub fn split_id<const N: usize>(id: &str, separator: char) -> Result<[&str; N], VpcError> {
    let invalid = || VpcError::InvalidId {
        id: id.to_owned(),
        expected: format!("{N} non-empty segments separated by '{separator}'"),
    };
    let mut segments = [""; N];
    let mut parts = id.split(separator);
    for slot in &mut segments {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() {
            return Err(invalid());
        }
        *slot = part;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(segments)
}

/// Maps a 404 to `None`, leaving other results untouched.
pub(crate) fn absent_on_not_found<T>(result: Result<T, VpcError>) -> Result<Option<T>, VpcError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Fetches `path` and reports its lifecycle state for a wait.
pub(crate) async fn observe<T>(client: &VpcClient, path: &str) -> Result<Observation<T>, VpcError>
where
    T: DeserializeOwned + HasLifecycle,
{
    match client.get_json::<T>(path).await {
        Ok(resource) => {
            let state = resource.lifecycle_state().to_owned();
            Ok(Observation::found(state, resource))
        }
        Err(err) if err.is_not_found() => Ok(Observation::Missing),
        Err(err) => Err(err),
    }
}

/// Identifies the operation a lifecycle wait belongs to.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Operation<'a> {
    pub(crate) action: &'static str,
    pub(crate) kind: &'static str,
    pub(crate) id: &'a str,
}

impl<'a> Operation<'a> {
    pub(crate) const fn new(action: &'static str, kind: &'static str, id: &'a str) -> Self {
        Self { action, kind, id }
    }

    /// Polls `path` under `profile` until it settles.
    ///
    /// Returns the settled resource, or `None` when it disappeared during a
    /// delete wait.
    pub(crate) async fn settle<T>(
        self,
        client: &VpcClient,
        path: &str,
        profile: LifecycleProfile,
        timeout: Duration,
    ) -> Result<Option<T>, VpcError>
    where
        T: DeserializeOwned + HasLifecycle,
    {
        let spec = WaitSpec::new(profile, client.poll_interval(), timeout);
        let label = format!("{} {}", self.kind, self.id);
        let outcome = StateWaiter::new(spec)
            .wait(&label, || observe::<T>(client, path))
            .await;
        self.interpret(outcome)
    }

    fn interpret<T>(
        self,
        outcome: Result<WaitOutcome<T>, WaitError<VpcError>>,
    ) -> Result<Option<T>, VpcError> {
        match outcome {
            Ok(WaitOutcome::Reached { state, resource }) => {
                info!(kind = self.kind, id = self.id, state = %state, action = self.action, "settled");
                Ok(Some(resource))
            }
            Ok(WaitOutcome::Deleted) => Ok(None),
            Ok(WaitOutcome::Failed { state, .. }) => Err(VpcError::Failed {
                action: self.action.to_owned(),
                resource: self.kind.to_owned(),
                id: self.id.to_owned(),
                state,
            }),
            Err(WaitError::Timeout { .. }) => Err(VpcError::Timeout {
                action: self.action.to_owned(),
                resource: self.kind.to_owned(),
                id: self.id.to_owned(),
            }),
            Err(WaitError::UnexpectedState { state }) => Err(VpcError::UnexpectedState {
                action: self.action.to_owned(),
                resource: self.kind.to_owned(),
                id: self.id.to_owned(),
                state,
            }),
            Err(WaitError::NotFound { .. }) => Err(VpcError::NotFound {
                resource: self.kind.to_owned(),
                id: self.id.to_owned(),
            }),
            Err(WaitError::Fetch(err)) => Err(err),
        }
    }

    /// Like [`Operation::settle`] for waits that must end with the resource
    /// present.
    pub(crate) async fn settle_present<T>(
        self,
        client: &VpcClient,
        path: &str,
        profile: LifecycleProfile,
        timeout: Duration,
    ) -> Result<T, VpcError>
    where
        T: DeserializeOwned + HasLifecycle,
    {
        self.settle(client, path, profile, timeout)
            .await?
            .ok_or_else(|| VpcError::NotFound {
                resource: self.kind.to_owned(),
                id: self.id.to_owned(),
            })
    }
}

/// Returns `Some(value)` unless it is empty or whitespace.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|inner| !inner.trim().is_empty())
}

/// Rejects a blank required field before any remote call.
pub(crate) fn require(value: &str, field: &str) -> Result<(), VpcError> {
    if value.trim().is_empty() {
        return Err(VpcError::Validation(format!("{field} is required")));
    }
    Ok(())
}
