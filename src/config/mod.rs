//! Process configuration
//!
//! A single immutable [`Config`] assembled once at startup from environment
//! variables (via the `config` crate, with `.env` loaded through `dotenvy`)
//! and optional CLI overrides, then handed to every component that needs it.
//! There is no hot-reload and no config-file format beyond `.env` — runtime
//! policy (providers, models, bindings) lives in the database and is read
//! through the config store view instead.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::utils::error::{GatewayError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// `postgres` or `sqlite`. A `postgres` database that fails to connect at
    /// startup falls back to an on-disk sqlite file; see [`crate::storage`].
    #[serde(default = "default_database_type")]
    pub database_type: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), database_type: default_database_type() }
    }
}

/// Health-probe cadence and the load balancer/dispatcher's retry defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Ingress authentication: a single admin key plus an optional caller
/// allow-list. There is no session/user store here — see the non-goals in
/// the design ledger for why.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub admin_key: Option<String>,
    /// Caller API keys permitted to call `/v1/*`. Empty means any bearer
    /// token is accepted (open gateway, e.g. local development).
    #[serde(default)]
    pub allowed_keys: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { admin_key: None, allowed_keys: Vec::new() }
    }
}

impl AuthConfig {
    pub fn is_allowed(&self, key: &str) -> bool {
        self.allowed_keys.is_empty() || self.allowed_keys.iter().any(|k| k == key)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `json` or `text`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Top-level process configuration, assembled once at startup and shared
/// read-only (behind an `Arc`) by every component.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `.env` (if present), then read the environment into a `Config`.
    /// CLI flags (`--host`/`--port`) take precedence over the environment
    /// when provided, matching the binary entrypoint's override order.
    pub fn load(cli: &crate::Cli) -> Result<Self> {
        if let Some(path) = &cli.config {
            load_dotenv(path)?;
        } else {
            let _ = dotenvy::dotenv();
        }

        let mut builder = config::Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("database.url", default_database_url())?
            .set_default("database.database_type", default_database_type())?
            .set_default("router.health_check_interval_secs", default_health_check_interval_secs() as i64)?
            .set_default("router.max_consecutive_failures", default_max_consecutive_failures() as i64)?
            .set_default("router.request_timeout_secs", default_request_timeout_secs() as i64)?
            .set_default("router.max_retries", default_max_retries() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .with_list_parse_key("auth.allowed_keys")
                    .list_separator(","),
            );

        if let Ok(host) = std::env::var("APP_HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = std::env::var("APP_PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }
        if let Ok(db_type) = std::env::var("DATABASE_TYPE") {
            builder = builder.set_override("database.database_type", db_type)?;
        }
        if let Ok(admin_key) = std::env::var("ADMIN_KEY") {
            builder = builder.set_override("auth.admin_key", admin_key)?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            builder = builder.set_override("logging.level", level)?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            builder = builder.set_override("logging.format", format)?;
        }

        if let Some(host) = &cli.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port as i64)?;
        }

        let raw = builder
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to assemble configuration: {e}")))?;

        let config: Self = raw
            .try_deserialize()
            .map_err(|e| GatewayError::Internal(format!("failed to deserialize configuration: {e}")))?;

        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GatewayError::validation("server.port must be nonzero"));
        }
        match self.database.database_type.as_str() {
            "postgres" | "sqlite" => {}
            other => {
                return Err(GatewayError::validation(format!(
                    "database.database_type must be 'postgres' or 'sqlite', got '{other}'"
                )));
            }
        }
        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(GatewayError::validation(format!(
                    "logging.format must be 'json' or 'text', got '{other}'"
                )));
            }
        }
        if self.router.max_consecutive_failures == 0 {
            return Err(GatewayError::validation("router.max_consecutive_failures must be nonzero"));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn load_dotenv(path: &Path) -> Result<()> {
    info!(path = %path.display(), "loading environment file");
    dotenvy::from_path(path)
        .map_err(|e| GatewayError::Internal(format!("failed to read env file {}: {e}", path.display())))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_database_url() -> String {
    "sqlite://gateway.db?mode=rwc".to_string()
}
fn default_database_type() -> String {
    "sqlite".to_string()
}
fn default_health_check_interval_secs() -> u64 {
    30
}
fn default_max_consecutive_failures() -> u32 {
    crate::core::health::DEFAULT_MAX_CONSECUTIVE_FAILURES
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_database_type() {
        let mut config = Config::default();
        config.database.database_type = "mongodb".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_allow_list_permits_any_key() {
        let auth = AuthConfig::default();
        assert!(auth.is_allowed("anything"));
    }

    #[test]
    fn nonempty_allow_list_rejects_unknown_key() {
        let auth = AuthConfig { admin_key: None, allowed_keys: vec!["sk-known".to_string()] };
        assert!(auth.is_allowed("sk-known"));
        assert!(!auth.is_allowed("sk-other"));
    }
}
