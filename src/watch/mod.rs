//! Watch (C2 + C4): durable watch records, the runtime watcher registry,
//! the in-memory `WatchStore` adapter, and the sweep scheduler.

pub mod memory_store;
mod record;
mod registry;
mod scheduler;

pub use record::{Watch, WatchMeta, WatchRecord};
pub use registry::{Watcher, WatcherOutcome, WatcherRegistry};
pub use scheduler::{
    DEFAULT_LOCK_TTL, DEFAULT_RESCHEDULE_BASELINE, DEFAULT_SWEEP_LIMIT, ExponentialBackoff,
    FixedLeaseExpiry, LeaseExpiryPolicy, ReschedulePolicy, WatchScheduler,
};

use crate::error::DomainError;
use crate::ports::{Clock, CreateWatch, WatchStore};

/// Control-flow entry point (b): create a durable watch intent.
///
/// Computes `expires = clock.now() + ttl` and rejects `ttl > 1 hour` (W3)
/// before delegating to `store.create`.
///
/// # Errors
///
/// Returns [`DomainError::Constraint`] when `ttl` exceeds the one-hour
/// creation ceiling, or whatever [`WatchStore::create`] returns (notably
/// [`DomainError::Duplicate`]).
pub async fn watch(
    store: &dyn WatchStore,
    clock: &dyn Clock,
    id: impl Into<String>,
    watcher: impl Into<String>,
    ttl: chrono::Duration,
) -> Result<WatchRecord, DomainError> {
    let now = clock.now();
    let expires = now + ttl;
    if Watch::ttl_exceeds_ceiling(now, expires) {
        return Err(DomainError::Constraint(
            "watch.ttl exceeds the one-hour creation ceiling".into(),
        ));
    }
    store
        .create(CreateWatch {
            id: id.into(),
            watcher: watcher.into(),
            expires,
        })
        .await
}

#[cfg(test)]
mod facade_tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::ports::FakeClock;
    use crate::watch::memory_store::InMemoryWatchStore;

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// (W3) a watch requested with `ttl > 1 hour` is rejected before
    /// reaching the store.
    #[tokio::test]
    async fn watch_rejects_ttl_over_one_hour_ceiling() {
        let clock = Arc::new(FakeClock::new(epoch()));
        let store = InMemoryWatchStore::new(clock.clone());

        let err = watch(
            &store,
            clock.as_ref(),
            "w1",
            "watchExchange",
            Duration::hours(1) + Duration::seconds(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::Constraint(_)));
        assert!(store.get("w1").await.is_err());
    }

    /// A `ttl` at or under the one-hour ceiling is persisted normally.
    #[tokio::test]
    async fn watch_accepts_ttl_at_ceiling() {
        let clock = Arc::new(FakeClock::new(epoch()));
        let store = InMemoryWatchStore::new(clock.clone());

        let record = watch(&store, clock.as_ref(), "w1", "watchExchange", Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(record.watch.id, "w1");
        assert_eq!(record.watch.expires, epoch() + Duration::hours(1));
    }
}
