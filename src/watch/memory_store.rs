//! `InMemoryWatchStore`: a production-grade in-process [`WatchStore`]
//! adapter.
//!
//! spec.md treats `WatchStore` as an external collaborator ("in-memory
//! acceptable for tests"); no concrete external document store is named,
//! so this is the adapter exercised by the scheduler and by every test in
//! this crate. A real document-store adapter is out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::DomainError;
use crate::ports::{Clock, CreateWatch, FindOptions, MarkOptions, WatchQuery, WatchStore};

use super::record::{Watch, WatchMeta, WatchRecord};

/// Grace period after `watch.expires` before a record is eligible for
/// [`InMemoryWatchStore::purge_expired`].
pub const EXPIRY_GRACE: chrono::Duration = chrono::Duration::hours(24);

/// An in-process, `DashMap`-backed watch record store.
///
/// Single write path per record: every mutating operation goes through
/// `DashMap`'s per-key locking, so `watch.id` uniqueness and the CAS
/// semantics on `update` are always consistent for a given key. `find`
/// and `mark`'s sweep variant walk the full map — appropriate for the
/// modest, per-process watch counts this store is sized for; an external
/// document store would maintain the index list in spec.md §4.2 instead.
pub struct InMemoryWatchStore {
    records: DashMap<String, WatchRecord>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryWatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWatchStore")
            .field("records", &self.records.len())
            .finish()
    }
}

impl InMemoryWatchStore {
    /// Build an empty store using `clock` for `created`/`updated`
    /// timestamps and lease-eligibility comparisons.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Remove records whose `watch.expires` plus the 24-hour grace period
    /// has passed. Not part of the [`WatchStore`] trait: a production
    /// external store would run this as a TTL index; here it is an
    /// explicit maintenance call the host application can schedule.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records
            .retain(|_, record| record.watch.expires + EXPIRY_GRACE > now);
        before - self.records.len()
    }
}

#[async_trait]
impl WatchStore for InMemoryWatchStore {
    async fn create(&self, input: CreateWatch) -> Result<WatchRecord, DomainError> {
        let now = self.clock.now();
        let record = WatchRecord {
            watch: Watch {
                id: input.id.clone(),
                sequence: 0,
                watcher: input.watcher,
                value: None,
                mutable: true,
                expires: input.expires,
            },
            meta: WatchMeta {
                created: now,
                updated: now,
                watcher_lock: None,
            },
        };

        match self.records.entry(input.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DomainError::Duplicate(input.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                debug!(id = %record.watch.id, "watch created");
                Ok(record)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<WatchRecord, DomainError> {
        self.records
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    async fn find(
        &self,
        query: WatchQuery,
        options: FindOptions,
    ) -> Result<Vec<WatchRecord>, DomainError> {
        let matches = self
            .records
            .iter()
            .filter(|entry| matches_query(entry.value(), &query))
            .take(options.limit)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(matches)
    }

    async fn update(&self, watch: Watch) -> Result<WatchRecord, DomainError> {
        let expected_prior = watch.sequence.saturating_sub(1);
        let mut entry = self
            .records
            .get_mut(&watch.id)
            .ok_or_else(|| DomainError::NotFound(watch.id.clone()))?;

        if entry.watch.sequence != expected_prior {
            return Err(DomainError::InvalidState {
                expected: expected_prior,
            });
        }

        entry.watch = watch;
        entry.meta.updated = self.clock.now();
        debug!(id = %entry.watch.id, sequence = entry.watch.sequence, "watch updated");
        Ok(entry.clone())
    }

    async fn remove(&self, id: &str) -> Result<(), DomainError> {
        self.records.remove(id);
        Ok(())
    }

    async fn mark(&self, options: MarkOptions) -> Result<usize, DomainError> {
        let now = self.clock.now();

        if let Some(id) = options.id {
            return Ok(match self.records.get_mut(&id) {
                Some(mut entry) => {
                    entry.meta.watcher_lock = Some(options.watcher_lock);
                    entry.meta.updated = now;
                    debug!(id = %entry.watch.id, "watch leased (single)");
                    1
                }
                None => 0,
            });
        }

        let mut marked = 0usize;
        for mut entry in self.records.iter_mut() {
            if marked >= options.limit {
                break;
            }
            // Q1: eligible when the lock is absent or already expired —
            // never when a live lease is held by another worker.
            let eligible = entry
                .meta
                .watcher_lock
                .is_none_or(|lock| lock.expires <= now);
            if eligible {
                entry.meta.watcher_lock = Some(options.watcher_lock);
                entry.meta.updated = now;
                marked += 1;
            }
        }
        debug!(marked, limit = options.limit, "sweep mark completed");
        Ok(marked)
    }
}

fn matches_query(record: &WatchRecord, query: &WatchQuery) -> bool {
    if let Some(ref id) = query.id {
        if &record.watch.id != id {
            return false;
        }
    }
    if let Some(expires_before) = query.expires_before {
        if record.watch.expires >= expires_before {
            return false;
        }
    }
    if let Some(lock_id) = query.lock_id {
        match record.meta.watcher_lock {
            Some(lock) if lock.id == lock_id => {}
            _ => return false,
        }
    }
    if let Some(lock_expires_before) = query.lock_expires_before {
        match record.meta.watcher_lock {
            Some(lock) if lock.expires < lock_expires_before => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::ports::{FakeClock, WatcherLock};

    fn store_at(time: DateTime<Utc>) -> (InMemoryWatchStore, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(time));
        (InMemoryWatchStore::new(clock.clone()), clock)
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_then_duplicate_is_rejected() {
        let (store, _clock) = store_at(epoch());
        let input = CreateWatch {
            id: "w1".into(),
            watcher: "watchExchange".into(),
            expires: epoch() + Duration::minutes(30),
        };
        store.create(input.clone()).await.unwrap();
        let err = store.create(input).await.unwrap_err();
        assert!(matches!(err, DomainError::Duplicate(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _clock) = store_at(epoch());
        assert!(matches!(
            store.get("missing").await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    /// (L3): create + remove leaves the store unchanged.
    #[tokio::test]
    async fn create_then_remove_is_idempotent_and_clean() {
        let (store, _clock) = store_at(epoch());
        let input = CreateWatch {
            id: "w1".into(),
            watcher: "watchExchange".into(),
            expires: epoch() + Duration::minutes(30),
        };
        store.create(input).await.unwrap();
        store.remove("w1").await.unwrap();
        store.remove("w1").await.unwrap(); // idempotent
        assert!(store.get("w1").await.is_err());
    }

    /// (P4): sequence advances by exactly 1 per successful CAS update.
    #[tokio::test]
    async fn update_advances_sequence_via_cas() {
        let (store, _clock) = store_at(epoch());
        let record = store
            .create(CreateWatch {
                id: "w1".into(),
                watcher: "watchExchange".into(),
                expires: epoch() + Duration::minutes(30),
            })
            .await
            .unwrap();

        let mut next = record.watch.clone();
        next.sequence = 1;
        next.value = Some(serde_json::json!({"state": "pending"}));
        let updated = store.update(next).await.unwrap();
        assert_eq!(updated.watch.sequence, 1);
    }

    #[tokio::test]
    async fn update_conflict_reports_expected_sequence() {
        let (store, _clock) = store_at(epoch());
        let record = store
            .create(CreateWatch {
                id: "w1".into(),
                watcher: "watchExchange".into(),
                expires: epoch() + Duration::minutes(30),
            })
            .await
            .unwrap();

        let mut stale = record.watch.clone();
        stale.sequence = 5; // CAS expected sequence - 1 == 0, record is at 0: mismatch
        let err = store.update(stale).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { expected: 4 }));
    }

    /// (Q1): a record whose lock has already expired is eligible again.
    #[tokio::test]
    async fn mark_sweeps_unlocked_and_expired_lease_records() {
        let (store, clock) = store_at(epoch());
        store
            .create(CreateWatch {
                id: "unlocked".into(),
                watcher: "w".into(),
                expires: epoch() + Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .create(CreateWatch {
                id: "expired-lock".into(),
                watcher: "w".into(),
                expires: epoch() + Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .mark(MarkOptions::single(
                "expired-lock",
                WatcherLock {
                    id: Uuid::new_v4(),
                    expires: epoch() - Duration::seconds(1),
                },
            ))
            .await
            .unwrap();

        store
            .create(CreateWatch {
                id: "live-lock".into(),
                watcher: "w".into(),
                expires: epoch() + Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .mark(MarkOptions::single(
                "live-lock",
                WatcherLock {
                    id: Uuid::new_v4(),
                    expires: epoch() + Duration::seconds(30),
                },
            ))
            .await
            .unwrap();

        let lease = WatcherLock {
            id: Uuid::new_v4(),
            expires: clock.now() + Duration::seconds(5),
        };
        let marked = store.mark(MarkOptions::sweep(lease, 10)).await.unwrap();

        assert_eq!(marked, 2); // unlocked + expired-lock, not live-lock
    }

    #[tokio::test]
    async fn mark_respects_limit() {
        let (store, _clock) = store_at(epoch());
        for i in 0..5 {
            store
                .create(CreateWatch {
                    id: format!("w{i}"),
                    watcher: "w".into(),
                    expires: epoch() + Duration::hours(1),
                })
                .await
                .unwrap();
        }
        let lease = WatcherLock {
            id: Uuid::new_v4(),
            expires: epoch() + Duration::seconds(5),
        };
        let marked = store.mark(MarkOptions::sweep(lease, 3)).await.unwrap();
        assert_eq!(marked, 3);
    }

    #[tokio::test]
    async fn find_by_lock_id_returns_leased_records() {
        let (store, _clock) = store_at(epoch());
        store
            .create(CreateWatch {
                id: "w1".into(),
                watcher: "w".into(),
                expires: epoch() + Duration::hours(1),
            })
            .await
            .unwrap();
        let lease_id = Uuid::new_v4();
        store
            .mark(MarkOptions::single(
                "w1",
                WatcherLock {
                    id: lease_id,
                    expires: epoch() + Duration::seconds(5),
                },
            ))
            .await
            .unwrap();

        let found = store
            .find(
                WatchQuery {
                    lock_id: Some(lease_id),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].watch.id, "w1");
    }

    #[tokio::test]
    async fn purge_expired_removes_records_past_grace_period() {
        let (store, clock) = store_at(epoch());
        store
            .create(CreateWatch {
                id: "w1".into(),
                watcher: "w".into(),
                expires: epoch() + Duration::minutes(5),
            })
            .await
            .unwrap();

        clock.set(epoch() + Duration::minutes(5) + EXPIRY_GRACE - Duration::seconds(1));
        assert_eq!(store.purge_expired(), 0);

        clock.set(epoch() + Duration::minutes(5) + EXPIRY_GRACE + Duration::seconds(1));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.get("w1").await.is_err());
    }
}
