//! PollCoalescer (C3): the heart of request-time concurrency.
//!
//! Two caches act in concert: an in-flight cache that guarantees
//! single-flight per resource id, and a result cache with a
//! mutability-aware TTL (terminal results are cached at [`MAX_TTL`]).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::DomainError;

/// TTL applied to a result once it becomes terminal (`mutable = false`).
pub const MAX_TTL: Duration = Duration::from_secs(15 * 60);

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// A cached observation of a polled resource.
///
/// Invariant: for a given `id`, a result with `mutable = false` is never
/// overwritten by one with `mutable = true`. Once terminal, always
/// terminal for the lifetime of the cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    /// Resource identifier, unique within this process's cache.
    pub id: String,
    /// Monotonically increasing per resource within this process.
    pub sequence: u64,
    /// `true` iff further polling may yield a different value.
    pub mutable: bool,
    /// Application-defined filtered snapshot, opaque to this crate.
    pub value: Value,
}

/// What a [`Poller`] reports after observing a resource once.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// The observed snapshot.
    pub value: Value,
    /// `false` once the resource has reached a terminal state.
    pub mutable: bool,
}

/// A function that observes a resource and reports what it saw.
///
/// # Contract
///
/// - Returns `mutable = false` once the resource is terminal.
/// - May return `value` unchanged from `current`; the coalescer collapses
///   this back to the prior result without advancing `sequence`.
/// - Errors propagate to the caller; the in-flight entry is released
///   either way.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Observe resource `id`, given the last cached result if any.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Operation`] (or any other domain error) on
    /// failure to observe the resource.
    async fn poll(
        &self,
        id: &str,
        current: Option<&PollResult>,
    ) -> Result<PollOutcome, DomainError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT CACHE EXPIRY POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-entry TTL policy: terminal results get [`MAX_TTL`]; everything else
/// gets the configured default.
struct ResultExpiry {
    default_ttl: Duration,
}

impl Expiry<String, PollResult> for ResultExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &PollResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(if value.mutable { self.default_ttl } else { MAX_TTL })
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &PollResult,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(if value.mutable { self.default_ttl } else { MAX_TTL })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLL COALESCER
// ═══════════════════════════════════════════════════════════════════════════════

/// A settling in-flight fetch: all concurrent callers for the same `id`
/// await the same cell, and only the first to arrive drives the fetch. A
/// failed fetch leaves the cell uninitialized so the next caller retries
/// rather than latching the failure.
type InFlightCell = Arc<OnceCell<PollResult>>;

/// Dedups concurrent fetches per resource id and caches results with
/// mutability-aware TTLs.
///
/// See spec §4.3: at most one `Poller` invocation is active per `id` at
/// any moment in this process; concurrent callers share its outcome.
pub struct PollCoalescer {
    in_flight: DashMap<String, InFlightCell>,
    in_flight_max: usize,
    results: Cache<String, PollResult>,
}

impl fmt::Debug for PollCoalescer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollCoalescer")
            .field("in_flight", &self.in_flight.len())
            .field("in_flight_max", &self.in_flight_max)
            .field("results", &self.results.entry_count())
            .finish()
    }
}

impl PollCoalescer {
    /// Build a coalescer with the given in-flight capacity, result-cache
    /// capacity, and default (non-terminal) result TTL.
    #[must_use]
    pub fn new(in_flight_max: usize, result_max_capacity: u64, default_ttl: Duration) -> Self {
        let results = Cache::builder()
            .max_capacity(result_max_capacity)
            .expire_after(ResultExpiry { default_ttl })
            .build();

        Self {
            in_flight: DashMap::new(),
            in_flight_max,
            results,
        }
    }

    /// Fetch the current result for `id`, coalescing concurrent callers
    /// into a single `poller` invocation.
    ///
    /// See spec §4.3 steps 1–4.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::QuotaExceeded`] if the in-flight cache is
    /// saturated and `id` has no entry already in flight. Otherwise
    /// propagates whatever `poller` returns.
    pub async fn poll(
        &self,
        id: &str,
        poller: &dyn Poller,
        use_cache: bool,
    ) -> Result<PollResult, DomainError> {
        if use_cache {
            if let Some(cached) = self.results.get(id) {
                debug!(id, "poll result cache hit");
                return Ok(cached);
            }
        }

        if !self.in_flight.contains_key(id) && self.in_flight.len() >= self.in_flight_max {
            return Err(DomainError::QuotaExceeded);
        }

        let cell = self
            .in_flight
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let result = cell
            .get_or_try_init(|| self.fetch(id, poller))
            .await
            .map(Clone::clone);

        self.in_flight.remove(id);
        result
    }

    /// The uncached fetch path: spec §4.3 step 4.
    async fn fetch(&self, id: &str, poller: &dyn Poller) -> Result<PollResult, DomainError> {
        let current = self.results.get(id);

        if let Some(ref cur) = current {
            if !cur.mutable {
                debug!(id, "terminal result short-circuit");
                self.results.insert(id.to_string(), cur.clone());
                return Ok(cur.clone());
            }
        }

        let sequence = current.as_ref().map_or(0, |c| c.sequence);
        let outcome = poller.poll(id, current.as_ref()).await?;

        let result = match &current {
            Some(cur) if cur.value == outcome.value && cur.mutable == outcome.mutable => {
                cur.clone()
            }
            _ => PollResult {
                id: id.to_string(),
                sequence: sequence + 1,
                mutable: outcome.mutable,
                value: outcome.value,
            },
        };

        self.results.insert(id.to_string(), result.clone());
        Ok(result)
    }
}
