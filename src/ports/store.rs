//! The `WatchStore` port: persistence contract for watch records.
//!
//! Implementations are external collaborators in production (typically a
//! document database); [`crate::watch::memory_store::InMemoryWatchStore`]
//! is a production-grade in-process implementation suitable for single-node
//! deployments and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::watch::{Watch, WatchRecord};

/// Input to [`WatchStore::create`].
#[derive(Debug, Clone)]
pub struct CreateWatch {
    /// Globally unique watch id.
    pub id: String,
    /// Name of the registered watcher that will service this watch.
    pub watcher: String,
    /// Absolute expiry; the store purges expired records after a grace
    /// period.
    pub expires: DateTime<Utc>,
}

/// An advisory lease attached to a watch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherLock {
    /// Lease identifier, unique per worker-sweep.
    pub id: Uuid,
    /// Absolute lease expiry.
    pub expires: DateTime<Utc>,
}

/// Query dimensions supported by [`WatchStore::find`].
///
/// All fields are optional filters; `None` means "don't filter on this
/// dimension". Multiple fields combine with logical AND.
#[derive(Debug, Clone, Default)]
pub struct WatchQuery {
    /// Match a specific watch id.
    pub id: Option<String>,
    /// Match records whose `watch.expires` is before this instant.
    pub expires_before: Option<DateTime<Utc>>,
    /// Match records currently leased under this lock id.
    pub lock_id: Option<Uuid>,
    /// Match records whose lock expiry is before this instant.
    pub lock_expires_before: Option<DateTime<Utc>>,
}

/// Options bounding a [`WatchStore::find`] call.
#[derive(Debug, Clone, Copy)]
pub struct FindOptions {
    /// Maximum number of records to return.
    pub limit: usize,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Options for [`WatchStore::mark`].
#[derive(Debug, Clone)]
pub struct MarkOptions {
    /// The lock to attach to matched records.
    pub watcher_lock: WatcherLock,
    /// If set, lease exactly this one record unconditionally (`limit` is
    /// then treated as 1 regardless of the supplied value).
    pub id: Option<String>,
    /// Maximum number of records to lease when `id` is absent.
    pub limit: usize,
}

impl MarkOptions {
    /// A mark targeting a single known record, unconditionally.
    #[must_use]
    pub fn single(id: impl Into<String>, watcher_lock: WatcherLock) -> Self {
        Self {
            watcher_lock,
            id: Some(id.into()),
            limit: 1,
        }
    }

    /// A mark that sweeps up to `limit` eligible records.
    #[must_use]
    pub fn sweep(watcher_lock: WatcherLock, limit: usize) -> Self {
        Self {
            watcher_lock,
            id: None,
            limit,
        }
    }
}

/// Persistent record store for watch intents.
///
/// # Implementation Notes
///
/// Implementations should maintain:
/// - a unique index on `watch.id`;
/// - a TTL index on `watch.expires` with a 24-hour grace period;
/// - a partial index on `meta.watcherLock.id` (only present when set);
/// - a partial index on `meta.watcherLock.expires`.
///
/// A record is eligible for `mark` when it carries no lease, or when its
/// lease has already expired — never when a live lease is held by another
/// worker.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Insert a fresh record with `sequence = 0`, `value = null`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Duplicate`] if `id` already exists.
    async fn create(&self, input: CreateWatch) -> Result<WatchRecord, DomainError>;

    /// Return the record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if no record exists.
    async fn get(&self, id: &str) -> Result<WatchRecord, DomainError>;

    /// Return records matching `query`, capped by `options.limit`.
    ///
    /// # Errors
    ///
    /// Returns an error only on a genuine storage failure; an empty result
    /// set is not an error.
    async fn find(
        &self,
        query: WatchQuery,
        options: FindOptions,
    ) -> Result<Vec<WatchRecord>, DomainError>;

    /// Compare-and-set on `watch.id == watch.id AND watch.sequence ==
    /// watch.sequence - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidState`] (with the sequence the caller
    /// should have supplied) when the CAS matches zero records.
    async fn update(&self, watch: Watch) -> Result<WatchRecord, DomainError>;

    /// Idempotent delete; removing a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only on a genuine storage failure.
    async fn remove(&self, id: &str) -> Result<(), DomainError>;

    /// Attach `options.watcher_lock` to eligible records and return the
    /// number of records modified.
    ///
    /// When `options.id` is set, the named record is leased
    /// unconditionally. Otherwise, up to `options.limit` records whose
    /// current lock is absent or already expired are leased.
    ///
    /// # Errors
    ///
    /// Returns an error only on a genuine storage failure.
    async fn mark(&self, options: MarkOptions) -> Result<usize, DomainError>;
}
