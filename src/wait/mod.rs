//! Poll-until-terminal-state helper shared by every resource lifecycle.
//!
//! A [`StateWaiter`] repeatedly invokes a fetch closure, classifies the
//! observed lifecycle state against a [`LifecycleProfile`], and sleeps a fixed
//! delay between attempts until a terminal state is seen or the timeout
//! elapses. Delete waits treat a missing resource as success.

pub mod profiles;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Default number of consecutive "not found" observations tolerated while
/// waiting for a resource to be provisioned.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Whether a wait tracks provisioning or removal of a resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitMode {
    /// The resource is expected to exist; a missing resource is tolerated
    /// only for a bounded number of polls.
    Provision,
    /// The resource is being removed; a missing resource is the terminal
    /// success state.
    Delete,
}

/// Named set of lifecycle states that drive one kind of wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LifecycleProfile {
    /// States that mean "keep polling".
    pub pending: &'static [&'static str],
    /// States that end the wait successfully.
    pub target: &'static [&'static str],
    /// States that end the wait unsuccessfully without waiting out the
    /// timeout.
    pub failed: &'static [&'static str],
    /// Provisioning or deletion semantics.
    pub mode: WaitMode,
}

impl LifecycleProfile {
    fn classify(&self, state: &str) -> StateClass {
        if self.target.contains(&state) {
            StateClass::Target
        } else if self.failed.contains(&state) {
            StateClass::Failed
        } else if self.pending.contains(&state) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StateClass {
    Pending,
    Target,
    Failed,
    Unexpected,
}

/// Profile plus timing parameters for a single wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitSpec {
    profile: LifecycleProfile,
    delay: Duration,
    timeout: Duration,
    not_found_checks: u32,
}

impl WaitSpec {
    /// Creates a spec for the given profile with the supplied poll delay and
    /// overall timeout.
    #[must_use]
    pub const fn new(profile: LifecycleProfile, delay: Duration, timeout: Duration) -> Self {
        Self {
            profile,
            delay,
            timeout,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    /// Overrides the number of consecutive missing observations tolerated
    /// during provisioning.
    #[must_use]
    pub const fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Returns the profile driving this wait.
    #[must_use]
    pub const fn profile(&self) -> &LifecycleProfile {
        &self.profile
    }

    /// Returns the fixed delay between polls.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns the maximum time spent waiting.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Result of a single fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Observation<T> {
    /// The resource exists and reports `state`.
    Found {
        /// Lifecycle state reported by the remote API.
        state: String,
        /// Full resource payload.
        resource: T,
    },
    /// The resource no longer exists.
    Missing,
}

impl<T> Observation<T> {
    /// Convenience constructor for a present resource.
    pub fn found(state: impl Into<String>, resource: T) -> Self {
        Self::Found {
            state: state.into(),
            resource,
        }
    }
}

/// Terminal outcome of a wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WaitOutcome<T> {
    /// A target state was observed.
    Reached {
        /// The terminal state.
        state: String,
        /// Resource as last observed.
        resource: T,
    },
    /// A failure state was observed; the wait ended early.
    Failed {
        /// The failure state.
        state: String,
        /// Resource as last observed.
        resource: T,
    },
    /// The resource disappeared during a delete wait.
    Deleted,
}

impl<T> WaitOutcome<T> {
    /// Returns the terminal state string, using `deleted` for removals.
    #[must_use]
    pub fn state(&self) -> &str {
        match self {
            Self::Reached { state, .. } | Self::Failed { state, .. } => state,
            Self::Deleted => "deleted",
        }
    }
}

/// Errors that end a wait without a terminal state.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WaitError<E> {
    /// The deadline passed before a terminal state was observed.
    #[error("timed out after {elapsed:?} and {attempts} polls (last state: {last_state})")]
    Timeout {
        /// Time spent waiting.
        elapsed: Duration,
        /// Number of fetches performed.
        attempts: u32,
        /// Last observed state, or `missing`.
        last_state: String,
    },
    /// The resource reported a state outside the profile.
    #[error("unexpected state '{state}'")]
    UnexpectedState {
        /// State reported by the API.
        state: String,
    },
    /// The resource kept disappearing while it should have been provisioned.
    #[error("resource not found after {checks} consecutive checks")]
    NotFound {
        /// Number of consecutive missing observations.
        checks: u32,
    },
    /// The fetch itself failed.
    #[error(transparent)]
    Fetch(E),
}

/// Lets a fetch error report that the underlying resource does not exist.
pub trait NotFoundSignal {
    /// Returns `true` when the error means "the resource is absent".
    fn is_not_found(&self) -> bool;
}

/// Polls a resource until it reaches a terminal state.
#[derive(Clone, Copy, Debug)]
pub struct StateWaiter {
    spec: WaitSpec,
}

impl StateWaiter {
    /// Builds a waiter for the given spec.
    #[must_use]
    pub const fn new(spec: WaitSpec) -> Self {
        Self { spec }
    }

    /// Polls `fetch` until the observed state is terminal, the resource
    /// disappears during a delete wait, or the timeout elapses.
    ///
    /// The first fetch happens immediately. No fetch is issued once the
    /// deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] when the deadline passes,
    /// [`WaitError::UnexpectedState`] for a state outside the profile,
    /// [`WaitError::NotFound`] when a provisioning resource stays missing, and
    /// [`WaitError::Fetch`] when `fetch` fails for any reason other than
    /// not-found.
    pub async fn wait<T, E, F, Fut>(
        &self,
        label: impl fmt::Display,
        mut fetch: F,
    ) -> Result<WaitOutcome<T>, WaitError<E>>
    where
        E: NotFoundSignal,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Observation<T>, E>>,
    {
        let profile = self.spec.profile;
        let started = Instant::now();
        // `None` when the timeout reaches past the clock's range.
        let deadline = started.checked_add(self.spec.timeout);
        let mut attempts: u32 = 0;
        let mut missing_streak: u32 = 0;
        let mut last_state: String;

        info!(
            resource = %label,
            targets = ?profile.target,
            timeout = ?self.spec.timeout,
            "waiting for terminal state"
        );

        loop {
            attempts = attempts.saturating_add(1);
            let observation = match fetch().await {
                Ok(observation) => observation,
                Err(err) if err.is_not_found() => Observation::Missing,
                Err(err) => return Err(WaitError::Fetch(err)),
            };

            match observation {
                Observation::Missing => match profile.mode {
                    WaitMode::Delete => {
                        info!(resource = %label, attempts, "resource is gone");
                        return Ok(WaitOutcome::Deleted);
                    }
                    WaitMode::Provision => {
                        missing_streak = missing_streak.saturating_add(1);
                        debug!(resource = %label, missing_streak, "resource not visible yet");
                        if missing_streak > self.spec.not_found_checks {
                            return Err(WaitError::NotFound {
                                checks: missing_streak,
                            });
                        }
                        last_state = String::from("missing");
                    }
                },
                Observation::Found { state, resource } => {
                    missing_streak = 0;
                    debug!(resource = %label, state = %state, attempts, "observed state");
                    match profile.classify(&state) {
                        StateClass::Target => {
                            info!(resource = %label, state = %state, attempts, "reached target state");
                            return Ok(WaitOutcome::Reached { state, resource });
                        }
                        StateClass::Failed => {
                            warn!(resource = %label, state = %state, "resource reported failure");
                            return Ok(WaitOutcome::Failed { state, resource });
                        }
                        StateClass::Unexpected => {
                            return Err(WaitError::UnexpectedState { state });
                        }
                        StateClass::Pending => last_state = state,
                    }
                }
            }

            let remaining = deadline.map_or(Duration::MAX, |at| {
                at.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return Err(Self::timeout_error(started, attempts, last_state));
            }
            sleep(self.spec.delay.min(remaining)).await;
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(Self::timeout_error(started, attempts, last_state));
            }
        }
    }

    fn timeout_error<E>(started: Instant, attempts: u32, last_state: String) -> WaitError<E> {
        WaitError::Timeout {
            elapsed: started.elapsed(),
            attempts,
            last_state,
        }
    }
}
