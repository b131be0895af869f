//! The watch data model: `Watch`, `WatchRecord`, and their metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::WatcherLock;

/// The mutable, sequence-versioned portion of a watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    /// Globally unique watch id.
    pub id: String,
    /// Starts at 0; each successful update sets it to `previous + 1` via a
    /// conditional compare-and-set keyed on the prior sequence.
    pub sequence: u64,
    /// Name of a registered watcher function.
    pub watcher: String,
    /// Last-observed filtered snapshot, or `None` before the first
    /// successful update.
    pub value: Option<Value>,
    /// Whether the underlying resource may still change. `true` at
    /// creation; set from the watcher's reported outcome on each
    /// successful update. See §4.5: the watcher adapter reads this back
    /// as `record.watch.mutable` when its filter reports no new value.
    pub mutable: bool,
    /// Absolute record expiry; the store purges expired records after a
    /// 24-hour grace period.
    pub expires: DateTime<Utc>,
}

/// Bookkeeping metadata attached to a watch record by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchMeta {
    /// When the record was first created.
    pub created: DateTime<Utc>,
    /// When the record was last updated (creation or any successful CAS).
    pub updated: DateTime<Utc>,
    /// Presence indicates a worker has leased this record. Absent or
    /// expired is eligible for lease.
    pub watcher_lock: Option<WatcherLock>,
}

/// A full watch record as persisted by the `WatchStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    /// The versioned watch payload.
    pub watch: Watch,
    /// Store-maintained bookkeeping.
    pub meta: WatchMeta,
}

impl Watch {
    /// `true` when the watch's TTL (`expires - created`, approximated
    /// here by `expires - now`) exceeds the one-hour creation ceiling
    /// (W3). Callers should check this against the requested TTL at
    /// creation time, not against a live record.
    #[must_use]
    pub fn ttl_exceeds_ceiling(now: DateTime<Utc>, expires: DateTime<Utc>) -> bool {
        expires - now > chrono::Duration::hours(1)
    }
}
