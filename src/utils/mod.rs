//! Ambient utilities: error taxonomy, tracing setup, token estimation.

pub mod error;
pub mod logging;
pub mod tokens;

pub use error::{GatewayError, Result};

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp in milliseconds since the epoch.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
