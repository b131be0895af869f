//! Configuration loading and validation for the `notify` namespace.

mod settings;

pub use settings::{
    CacheSettings, HmacKeySettings, LoggingSettings, PollCacheSettings, PollResultCacheSettings,
    PushSettings, SchedulerSettings, Settings,
};
