//! `WatchScheduler` (C4): a single per-process sweep loop that leases and
//! executes watches persisted in the `WatchStore`.
//!
//! ```text
//!   UNLEASED ──mark(lease)──► LEASED ──watcher(record)──► (value present?)
//!                                                            │
//!                                                            ├─ yes → update(sequence+1) ─► UNLEASED
//!                                                            └─ no  → (lease expires)     ─► UNLEASED
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::DomainError;
use crate::ports::{Clock, FindOptions, MarkOptions, WatchQuery, WatchStore, WatcherLock};

use super::record::WatchRecord;
use super::registry::WatcherRegistry;

/// Default advisory lease length: short, so a crashed worker's records
/// become eligible again quickly.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);

/// Baseline reschedule delay when the sweep found work to do.
pub const DEFAULT_RESCHEDULE_BASELINE: Duration = Duration::from_secs(1);

/// Default sweep parallelism / lease batch size.
pub const DEFAULT_SWEEP_LIMIT: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// INJECTABLE POLICIES (spec §9: `_setLockExpiresTimeHook` / `_setRescheduleTimeHook`)
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes the absolute lease expiry for a sweep tick.
pub trait LeaseExpiryPolicy: Send + Sync {
    /// Given the tick's `now`, return the lease's absolute expiry.
    fn lock_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc>;
}

/// A fixed-duration lease, relative to `now`.
#[derive(Debug, Clone, Copy)]
pub struct FixedLeaseExpiry(pub Duration);

impl LeaseExpiryPolicy for FixedLeaseExpiry {
    fn lock_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::from_std(self.0).unwrap_or(chrono::Duration::seconds(5))
    }
}

/// Computes the delay before the next sweep tick, given how many records
/// the current tick leased out of its limit.
pub trait ReschedulePolicy: Send + Sync {
    /// See spec §4.4 step 3.
    fn next_delay(&self, marked: usize, limit: usize) -> Duration;
}

/// Saturated ⇒ immediate reschedule; empty ⇒ exponential back-off from a
/// baseline; otherwise ⇒ the baseline itself (P7).
#[derive(Debug)]
pub struct ExponentialBackoff {
    baseline: Duration,
    consecutive_empty: AtomicUsize,
}

impl ExponentialBackoff {
    /// Build a back-off policy starting from `baseline` (1 s by spec
    /// default).
    #[must_use]
    pub const fn new(baseline: Duration) -> Self {
        Self {
            baseline,
            consecutive_empty: AtomicUsize::new(0),
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RESCHEDULE_BASELINE)
    }
}

impl ReschedulePolicy for ExponentialBackoff {
    fn next_delay(&self, marked: usize, limit: usize) -> Duration {
        if limit > 0 && marked == limit {
            self.consecutive_empty.store(0, Ordering::SeqCst);
            return Duration::ZERO;
        }
        if marked == 0 {
            let k = self.consecutive_empty.fetch_add(1, Ordering::SeqCst) + 1;
            let exponent = u32::try_from(k).unwrap_or(u32::MAX);
            return self.baseline.saturating_mul(2u32.saturating_pow(exponent));
        }
        self.consecutive_empty.store(0, Ordering::SeqCst);
        self.baseline
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════════

/// The per-process sweep loop driving durable watches.
pub struct WatchScheduler {
    store: Arc<dyn WatchStore>,
    registry: Arc<WatcherRegistry>,
    clock: Arc<dyn Clock>,
    lease_policy: Arc<dyn LeaseExpiryPolicy>,
    reschedule_policy: Arc<dyn ReschedulePolicy>,
    sweep_limit: usize,
}

impl std::fmt::Debug for WatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchScheduler")
            .field("sweep_limit", &self.sweep_limit)
            .finish()
    }
}

impl WatchScheduler {
    /// Build a scheduler with default lease/reschedule policies.
    #[must_use]
    pub fn new(store: Arc<dyn WatchStore>, registry: Arc<WatcherRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
            lease_policy: Arc::new(FixedLeaseExpiry(DEFAULT_LOCK_TTL)),
            reschedule_policy: Arc::new(ExponentialBackoff::default()),
            sweep_limit: DEFAULT_SWEEP_LIMIT,
        }
    }

    /// Override the lease-expiry policy (test hook for
    /// `_setLockExpiresTimeHook`).
    #[must_use]
    pub fn with_lease_policy(mut self, policy: Arc<dyn LeaseExpiryPolicy>) -> Self {
        self.lease_policy = policy;
        self
    }

    /// Override the reschedule policy (test hook for
    /// `_setRescheduleTimeHook`).
    #[must_use]
    pub fn with_reschedule_policy(mut self, policy: Arc<dyn ReschedulePolicy>) -> Self {
        self.reschedule_policy = policy;
        self
    }

    /// Override the sweep batch size / parallelism limit (default 10).
    #[must_use]
    pub fn with_sweep_limit(mut self, limit: usize) -> Self {
        self.sweep_limit = limit;
        self
    }

    /// Run exactly one sweep tick (spec §4.4 steps 1–6) and return the
    /// delay before the next one (step 3/7).
    ///
    /// Any error from the store is logged, not propagated: the sweep
    /// never terminates because of a per-record or per-sweep failure.
    pub async fn tick(&self) -> Duration {
        let now = self.clock.now();
        let lock_expiry = self.lease_policy.lock_expiry(now);
        let lease_id = Uuid::new_v4();
        let watcher_lock = WatcherLock {
            id: lease_id,
            expires: lock_expiry,
        };

        let marked = match self
            .store
            .mark(MarkOptions::sweep(watcher_lock, self.sweep_limit))
            .await
        {
            Ok(n) => n,
            Err(err) => {
                error!(error = %err, "watch sweep mark failed");
                0
            }
        };

        let delay = self.reschedule_policy.next_delay(marked, self.sweep_limit);
        if marked == 0 {
            return delay;
        }

        let leased = match self
            .store
            .find(
                WatchQuery {
                    lock_id: Some(lease_id),
                    ..Default::default()
                },
                FindOptions {
                    limit: self.sweep_limit,
                },
            )
            .await
        {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "watch sweep find failed");
                return delay;
            }
        };

        let tasks = leased.into_iter().map(|record| self.process_record(record));
        futures::future::join_all(tasks).await;

        delay
    }

    /// Invoke the record's registered watcher and write the outcome back,
    /// per spec §4.4 step 5. All failures are logged and swallowed.
    async fn process_record(&self, record: WatchRecord) {
        let Some(watcher) = self.registry.get(&record.watch.watcher) else {
            warn!(
                id = %record.watch.id,
                watcher = %record.watch.watcher,
                "unregistered watcher; lease will expire on its own"
            );
            return;
        };

        let outcome = match watcher.invoke(&record).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(id = %record.watch.id, error = %err, "watcher invocation failed");
                return;
            }
        };

        let Some(value) = outcome.value else {
            debug!(id = %record.watch.id, "watcher reported no update; lease left to expire");
            return;
        };

        let mut next = record.watch.clone();
        next.sequence += 1;
        next.value = Some(value);
        next.mutable = outcome.mutable;

        match self.store.update(next).await {
            Ok(updated) => debug!(
                id = %updated.watch.id,
                sequence = updated.watch.sequence,
                mutable = updated.watch.mutable,
                "watch updated from sweep"
            ),
            Err(DomainError::InvalidState { expected }) => warn!(
                id = %record.watch.id,
                expected,
                "sequence conflict dropped; next sweep observes the new sequence"
            ),
            Err(err) => error!(id = %record.watch.id, error = %err, "watch update failed"),
        }
    }

    /// Spawn the recurring sweep loop as a background task.
    ///
    /// Ticks are not cancellable mid-record: on shutdown, the in-flight
    /// tick always completes before the loop checks for cancellation and
    /// the loop is not rescheduled again (spec §5).
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                let delay = self.tick().await;
                if shutdown.is_cancelled() {
                    break;
                }
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shutdown.cancelled() => break,
                }
            }
        })
    }
}
