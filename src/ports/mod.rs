//! Ports: trait boundaries between this crate's core engineering and its
//! external collaborators.
//!
//! ```text
//!   ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐
//!   │   Clock     │     │  WatchStore  │     │  ResourceClient   │
//!   │ (testable   │     │ (persistence,│     │ (capability HTTP, │
//!   │  time)      │     │  CAS, leases)│     │  opaque fetch)    │
//!   └─────────────┘     └──────────────┘     └───────────────────┘
//! ```
//!
//! | Port | Used by | Production adapter |
//! |------|---------|---------------------|
//! | `Clock` | push tokens, scheduler | `SystemClock` |
//! | `WatchStore` | scheduler | `watch::memory_store::InMemoryWatchStore` (or an external document store) |
//! | `ResourceClient` | exchange watcher/poller adapters | application-supplied |

mod clock;
mod resource_client;
mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-utils"))]
pub use clock::FakeClock;
pub use resource_client::{Capability, ResourceClient};
pub use store::{CreateWatch, FindOptions, MarkOptions, WatchQuery, WatchStore, WatcherLock};
