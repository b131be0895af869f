//! The runtime watcher registry: a name-to-function table populated once
//! at startup and read concurrently (lock-free) by the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::DomainError;

use super::record::WatchRecord;

/// The outcome of invoking a watcher against a leased record.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherOutcome {
    /// `None` signals a no-op: no update is written and the lease expires
    /// on its own. `Some` carries the new snapshot to persist.
    pub value: Option<Value>,
    /// Whether the resource may still change; recorded on the watch so
    /// the next sweep can decide whether to keep polling.
    pub mutable: bool,
}

/// A registered watcher: given a leased record, observes the underlying
/// resource and reports what (if anything) changed.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Observe the resource referenced by `record` and report the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Operation`] if the underlying fetch fails;
    /// the scheduler logs this and lets the lease expire.
    async fn invoke(&self, record: &WatchRecord) -> Result<WatcherOutcome, DomainError>;
}

/// A process-wide, lock-free-on-read registry mapping watcher names to
/// implementations.
///
/// Registry writes are expected only during startup; reads are concurrent
/// from every scheduler sweep.
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: DashMap<String, Arc<dyn Watcher>>,
}

impl std::fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherRegistry")
            .field("registered", &self.watchers.len())
            .finish()
    }
}

impl WatcherRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher under `name`, replacing any prior registration.
    pub fn register(&self, name: impl Into<String>, watcher: Arc<dyn Watcher>) {
        self.watchers.insert(name.into(), watcher);
    }

    /// Look up a watcher by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Watcher>> {
        self.watchers.get(name).map(|entry| entry.value().clone())
    }
}
