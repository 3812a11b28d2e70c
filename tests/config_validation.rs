//! Configuration validation integration tests
//!
//! Exercises `Config` through its public surface only (no `Cli`/env
//! plumbing), matching how `Config::validate` is actually invoked from
//! `Config::load`.

use model_gateway::{Cli, Config};
use std::io::Write;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.database_type, "sqlite");
}

#[test]
fn address_combines_host_and_port() {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 9009;
    assert_eq!(config.address(), "127.0.0.1:9009");
}

#[test]
fn auth_allow_list_is_empty_by_default() {
    let config = Config::default();
    assert!(config.auth.allowed_keys.is_empty());
    assert!(config.auth.is_allowed("sk-anything"));
}

#[test]
fn load_reads_env_file_pointed_to_by_cli_flag() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "APP_HOST=10.0.0.9").unwrap();
    writeln!(file, "APP_PORT=7070").unwrap();
    file.flush().unwrap();

    let cli = Cli { config: Some(file.path().to_path_buf()), host: None, port: None };
    let config = Config::load(&cli).unwrap();

    assert_eq!(config.server.host, "10.0.0.9");
    assert_eq!(config.server.port, 7070);
}

#[test]
fn load_rejects_invalid_database_type() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "DATABASE_TYPE=mongodb").unwrap();
    file.flush().unwrap();

    let cli = Cli { config: Some(file.path().to_path_buf()), host: None, port: None };
    assert!(Config::load(&cli).is_err());
}
