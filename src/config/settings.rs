//! Settings structs and loading logic for the `notify` configuration
//! namespace (spec §6).
//!
//! Layering mirrors the teacher's `Settings::load`: `set_default` values,
//! then `config/default.toml`, then `config/{environment}.toml`, then
//! `NOTIFY__`-prefixed, double-underscore-separated environment
//! variables. `validate()` collects every violation instead of failing on
//! the first one.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure for the `notify` namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Poll coalescer cache sizing.
    pub caches: CacheSettings,
    /// Push-token HMAC key configuration.
    #[serde(default)]
    pub push: PushSettings,
    /// Watch scheduler sweep tuning.
    pub scheduler: SchedulerSettings,
    /// Structured logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration is invalid or cannot be
    /// loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            .set_default("caches.poll.max", 10_000)?
            .set_default("caches.pollResult.max", 100)?
            .set_default("caches.pollResult.ttl", 30_000)?
            .set_default("scheduler.lockTtlMs", 5_000)?
            .set_default("scheduler.rescheduleBaselineMs", 1_000)?
            .set_default("scheduler.sweepLimit", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate settings, returning every violation at once.
    ///
    /// # Errors
    ///
    /// Returns the list of human-readable violations; empty input means
    /// valid.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.caches.poll.max == 0 {
            errors.push("caches.poll.max must be non-zero".into());
        }
        if self.caches.poll_result.max == 0 {
            errors.push("caches.pollResult.max must be non-zero".into());
        }
        if self.scheduler.sweep_limit == 0 {
            errors.push("scheduler.sweepLimit must be non-zero".into());
        }
        if let Some(hmac) = &self.push.hmac_key {
            if hmac.id.is_empty() {
                errors.push("push.hmacKey.id cannot be empty when push.hmacKey is set".into());
            }
            if hmac.secret_key_multibase.is_empty() {
                errors.push("push.hmacKey.secretKeyMultibase cannot be empty when push.hmacKey is set".into());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Poll coalescer / poll-result cache sizing (spec §6 `caches.*`).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// In-flight poll cache bound.
    pub poll: PollCacheSettings,
    /// Result cache bound and default TTL.
    #[serde(rename = "pollResult")]
    pub poll_result: PollResultCacheSettings,
}

/// `caches.poll.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct PollCacheSettings {
    /// Maximum concurrent in-flight polls.
    pub max: usize,
}

/// `caches.pollResult.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResultCacheSettings {
    /// Result cache capacity.
    pub max: u64,
    /// Default (non-terminal) TTL in milliseconds.
    pub ttl: u64,
}

impl PollResultCacheSettings {
    /// The default TTL as a `Duration`.
    #[must_use]
    pub const fn ttl_duration(&self) -> Duration {
        Duration::from_millis(self.ttl)
    }
}

/// `push.*`. `hmac_key` is `None` when push notifications are disabled.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PushSettings {
    /// The HMAC key configuration, absent when push is disabled.
    #[serde(rename = "hmacKey", default)]
    pub hmac_key: Option<HmacKeySettings>,
}

/// `push.hmacKey.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct HmacKeySettings {
    /// Opaque key identifier (for rotation bookkeeping; not used in the
    /// signature itself).
    pub id: String,
    /// Multibase-`u` (base64url) encoded multikey blob.
    #[serde(rename = "secretKeyMultibase")]
    pub secret_key_multibase: String,
}

/// Watch scheduler sweep tuning. Not part of spec §6's configuration
/// table verbatim, but the natural configuration surface for C4's tunable
/// constants (lease TTL, reschedule baseline, sweep batch size).
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Advisory lease length in milliseconds (default 5000).
    #[serde(rename = "lockTtlMs")]
    pub lock_ttl_ms: u64,
    /// Baseline reschedule delay in milliseconds when work was found
    /// (default 1000).
    #[serde(rename = "rescheduleBaselineMs")]
    pub reschedule_baseline_ms: u64,
    /// Sweep batch size / parallelism (default 10).
    #[serde(rename = "sweepLimit")]
    pub sweep_limit: usize,
}

impl SchedulerSettings {
    /// The lease TTL as a `Duration`.
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    /// The reschedule baseline as a `Duration`.
    #[must_use]
    pub const fn reschedule_baseline(&self) -> Duration {
        Duration::from_millis(self.reschedule_baseline_ms)
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}
