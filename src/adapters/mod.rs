//! WatcherAdapter (C4, thin): factories that turn a [`ResourceClient`] plus
//! an application-supplied filter into a registered [`Watcher`] or
//! [`Poller`], per spec §4.5.

mod exchange;

pub use exchange::{ExchangeFilter, ExchangePoller, ExchangeWatcher};
