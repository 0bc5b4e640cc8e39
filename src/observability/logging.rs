//! Structured logging initialization.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber once, at startup
//! - Honor `RUST_LOG` when set, otherwise fall back to the configured level
//!
//! # Design Decisions
//! - JSON output when `FLEETFRONT_LOG_FORMAT=json` is set (production),
//!   human-readable compact output otherwise (local development)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string()));

    let json_output = std::env::var("FLEETFRONT_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
