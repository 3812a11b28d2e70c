//! Tracing initialization
//!
//! Single entry point for wiring up the global `tracing` subscriber. Respects
//! `RUST_LOG` via `EnvFilter`, falling back to the configured `logging.level`
//! when unset, and switches to JSON output when `logging.format` is `json`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// Safe to call once at process startup; panics if a subscriber is already
/// installed (mirrors `tracing_subscriber`'s own behavior).
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let json = config.format.eq_ignore_ascii_case("json");

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}
