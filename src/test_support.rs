//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::future::{Ready, ready};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::config::{DEFAULT_API_VERSION, VpcConfig};
use crate::wait::{NotFoundSignal, Observation};

/// Error produced by [`ScriptedFetch`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedFetchError {
    /// Simulates an HTTP 404 from the remote API.
    #[error("resource not found")]
    NotFound,
    /// Simulates any other remote failure.
    #[error("scripted failure: {0}")]
    Failure(String),
}

impl NotFoundSignal for ScriptedFetchError {
    fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Response replayed by [`ScriptedFetch`].
pub type ScriptedResponse = Result<Observation<String>, ScriptedFetchError>;

/// Scripted state source that replays queued observations in FIFO order.
///
/// Once the queue is drained the last response is replayed indefinitely, so a
/// single `pending` entry models a resource that never settles. Every call is
/// counted.
#[derive(Clone, Debug, Default)]
pub struct ScriptedFetch {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    last: Arc<Mutex<Option<ScriptedResponse>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedFetch {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a script from a list of lifecycle states.
    #[must_use]
    pub fn from_states(states: &[&str]) -> Self {
        let script = Self::new();
        for state in states {
            script.push_state(state);
        }
        script
    }

    /// Queues an observation of a present resource in `state`.
    pub fn push_state(&self, state: &str) {
        self.push(Ok(Observation::found(state, state.to_owned())));
    }

    /// Queues an observation of a missing resource.
    pub fn push_missing(&self) {
        self.push(Ok(Observation::Missing));
    }

    /// Queues a not-found error.
    pub fn push_not_found(&self) {
        self.push(Err(ScriptedFetchError::NotFound));
    }

    /// Queues a generic failure.
    pub fn push_failure(&self, message: &str) {
        self.push(Err(ScriptedFetchError::Failure(message.to_owned())));
    }

    fn push(&self, response: ScriptedResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Returns how many times [`ScriptedFetch::fetch`] has been called.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the next scripted response as a ready future.
    ///
    /// Resolves to [`ScriptedFetchError::Failure`] when nothing was ever
    /// scripted.
    pub fn fetch(&self) -> Ready<ScriptedResponse> {
        ready(self.next_response())
    }

    fn next_response(&self) -> ScriptedResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(response) = next {
            *last = Some(response.clone());
            return response;
        }
        last.clone().unwrap_or_else(|| {
            Err(ScriptedFetchError::Failure(String::from(
                "no scripted response",
            )))
        })
    }
}

/// Builds a configuration that points both the VPC API and the IAM token
/// service at `endpoint`, with one-second waits suitable for mock servers.
#[must_use]
pub fn config_for_endpoint(endpoint: &str) -> VpcConfig {
    VpcConfig {
        api_key: String::from("test-api-key"),
        region: String::from("us-south"),
        endpoint: Some(endpoint.to_owned()),
        iam_endpoint: endpoint.to_owned(),
        api_version: String::from(DEFAULT_API_VERSION),
        generation: 2,
        poll_interval_secs: 1,
        create_timeout_secs: 5,
        update_timeout_secs: 5,
        delete_timeout_secs: 5,
        http_timeout_secs: 5,
    }
}
