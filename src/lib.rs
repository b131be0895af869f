//! A notification substrate for long-running, externally-hosted
//! resources whose state evolves over time.
//!
//! Three cooperating mechanisms, in dependency order (leaves first):
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      NOTIFICATION SUBSTRATE                     │
//! │                                                                 │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐    │
//! │   │  PushTokens  │   │  WatchStore  │   │  PollCoalescer   │    │
//! │   │     (C1)     │   │     (C2)     │   │       (C3)       │    │
//! │   └──────────────┘   └──────┬───────┘   └────────┬─────────┘    │
//! │                             │                    │              │
//! │                      ┌──────▼────────────────────▼───────┐      │
//! │                      │        WatchScheduler (C4)        │      │
//! │                      └────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`ports`] — `Clock`, `WatchStore`, `ResourceClient` trait boundaries
//!   to this crate's external collaborators.
//! - [`push`] — C1: stateless HMAC-bound push tokens and the callback
//!   gateway middleware.
//! - [`watch`] — C2 + C4: the watch data model, the in-memory
//!   `WatchStore` adapter, the watcher registry, and the sweep scheduler.
//! - [`poll`] — C3: the coalesced polling cache.
//! - [`adapters`] — thin factories bridging a `ResourceClient` into the
//!   `Watcher`/`Poller` contracts C4/C3 actually run.
//! - [`gateway`] — the minimal HTTP surface exposing the poll and
//!   callback routes.
//! - [`config`] — settings loading and validation.
//! - [`error`] — the layered error hierarchy and its HTTP mapping.
//!
//! # Non-goals
//!
//! Guaranteed push delivery, exactly-once watch callback execution, and
//! cross-process cache coherence are explicitly out of scope: push is
//! best-effort (polling is authoritative), watch callbacks are
//! at-least-once with idempotent updates, and each process owns its own
//! poll/result caches — only the `WatchStore` is shared state.

pub mod adapters;
pub mod config;
pub mod error;
pub mod gateway;
pub mod poll;
pub mod ports;
pub mod push;
pub mod watch;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
