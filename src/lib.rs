//! # model-gateway
//!
//! An OpenAI-compatible chat-completions gateway that routes requests across
//! multiple LLM backends (OpenAI, Anthropic, Gemini), with weighted load
//! balancing across provider instances, background health probing, and a
//! dispatcher that retries transient failures and falls back across
//! candidates before giving up.
//!
//! ## Layout
//!
//! - [`config`] — process configuration, loaded once at startup
//! - [`core`] — the [`core::Gateway`] orchestration root: provider adapters,
//!   health store, load balancer/dispatcher, streaming accounting
//! - [`storage`] — SeaORM persistence and the config store view the
//!   dispatcher reads candidate bindings from
//! - [`server`] — the actix-web HTTP layer: middleware, routes, and the
//!   process entrypoint
//! - [`utils`] — error taxonomy, tracing setup, token estimation

#![allow(missing_docs)]

pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use core::Gateway;
pub use utils::error::{GatewayError, Result};

use clap::Parser;

/// Command-line entrypoint. Every field is optional: absent values fall back
/// to environment variables and finally to [`config`]'s built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Multi-backend LLM gateway", version)]
pub struct Cli {
    /// Path to a `.env`-format file to load before reading the environment.
    #[arg(long, value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,

    /// Override `server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Override `server.port`.
    #[arg(long)]
    pub port: Option<u16>,
}

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_cargo_metadata() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(NAME, env!("CARGO_PKG_NAME"));
    }
}
