//! `notify-core` CLI.
//!
//! Provides subcommands for exercising the push-token gateway directly;
//! hosting the full HTTP surface (`serve`) requires the application to
//! supply a concrete `ResourceClient` and watcher registrations, which
//! are out of scope for this crate (spec §1) and therefore left as an
//! integration point for the embedding application.

use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use notify_core::config::Settings;
use notify_core::ports::{Clock, SystemClock};
use notify_core::push::{HmacKey, create_push_token, verify_push_token};
use tracing::{error, info};

/// `notify-core`: coalesced polling, durable watch scheduling, and
/// push-token verification for externally hosted resources.
#[derive(Parser, Debug)]
#[command(name = "notify-core")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Environment name used for config layering
    /// (`config/<environment>.toml`).
    #[arg(short, long, env = "NOTIFY_ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint a push token for `event`.
    MintToken {
        /// Event name to bind into the token.
        event: String,
        /// Token lifetime in seconds (defaults to 20 minutes).
        #[arg(long)]
        ttl_secs: Option<i64>,
    },

    /// Verify a previously minted push token.
    VerifyToken {
        /// The bearer token to verify.
        token: String,
        /// If set, the token must be bound to this event.
        #[arg(long)]
        expected_event: Option<String>,
    },

    /// Start the HTTP gateway (requires an embedding application).
    Serve,

    /// Show version information.
    Version,
}

fn main() {
    let cli = Cli::parse();

    let filter_directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directive)),
        )
        .init();

    let settings = match Settings::load(&cli.environment) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(violations) = settings.validate() {
        for violation in &violations {
            error!(violation, "invalid configuration");
        }
        std::process::exit(1);
    }

    info!(version = notify_core::VERSION, "starting notify-core");

    match cli.command {
        Commands::MintToken { event, ttl_secs } => mint_token(&settings, &event, ttl_secs),
        Commands::VerifyToken {
            token,
            expected_event,
        } => verify_token(&settings, &token, expected_event.as_deref()),
        Commands::Serve => {
            info!("serve command requires an embedding application to supply a ResourceClient and register watchers");
            println!("notify-core is a library crate; wire `gateway::router` into your own axum server.");
        }
        Commands::Version => {
            println!("notify-core {}", notify_core::VERSION);
        }
    }
}

fn mint_token(settings: &Settings, event: &str, ttl_secs: Option<i64>) {
    let clock = SystemClock::new();
    let key = match HmacKey::from_settings(settings.push.hmac_key.as_ref()) {
        Ok(Some(key)) => key,
        Ok(None) => {
            error!("push notifications are disabled; set push.hmacKey to mint tokens");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "failed to load push HMAC key");
            std::process::exit(1);
        }
    };

    let expires = ttl_secs.map(|secs| clock.now() + ChronoDuration::seconds(secs));
    let pair = create_push_token(&key, event, expires, &clock);
    println!("{}", pair.token);
}

fn verify_token(settings: &Settings, token: &str, expected_event: Option<&str>) {
    let clock = SystemClock::new();
    let key = match HmacKey::from_settings(settings.push.hmac_key.as_ref()) {
        Ok(Some(key)) => key,
        Ok(None) => {
            error!("push notifications are disabled; set push.hmacKey to verify tokens");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "failed to load push HMAC key");
            std::process::exit(1);
        }
    };

    match verify_push_token(&key, token, expected_event, &clock) {
        Ok(verified) => {
            println!("valid: event={} expires={}", verified.event, verified.expires);
        }
        Err(_) => {
            println!("invalid push token");
            std::process::exit(1);
        }
    }
}
