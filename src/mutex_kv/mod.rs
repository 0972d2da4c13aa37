//! Process-wide named locks keyed by arbitrary runtime strings.
//!
//! Rule mutations against one security group, or policy mutations against
//! one load balancer, must not interleave. Each key maps to its own async
//! mutex; entries are created on first use and live for the whole process.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

static GLOBAL: LazyLock<MutexKv> = LazyLock::new(MutexKv::new);

/// Registry of async mutexes indexed by string key.
#[derive(Debug, Default)]
pub struct MutexKv {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MutexKv {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by every resource in this process.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Waits for exclusive ownership of `key`. The lock is released when the
    /// returned guard is dropped, on every exit path.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let handle = self.handle(key);
        debug!(key, "acquiring keyed lock");
        let guard = handle.lock_owned().await;
        debug!(key, "acquired keyed lock");
        KeyGuard {
            key: key.to_owned(),
            _guard: guard,
        }
    }

    /// Number of distinct keys seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    /// Returns `true` when no key has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    fn handle(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.registry();
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped ownership of one key in a [`MutexKv`].
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    /// Key held by this guard.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        debug!(key = %self.key, "released keyed lock");
    }
}
