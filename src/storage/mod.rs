//! Persistence layer: SeaORM connection, config store view, and the
//! request-log sink the dispatcher writes through.

pub mod database;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::utils::error::Result;

pub use database::{ConfigStore, DatabaseLogSink, SeaOrmDatabase};

/// Owns the database connection and the derived views/sinks built on top of it.
#[derive(Clone)]
pub struct StorageLayer {
    pub database: SeaOrmDatabase,
    pub config_store: ConfigStore,
    pub log_sink: Arc<DatabaseLogSink>,
}

impl StorageLayer {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("connecting to database");
        let database = SeaOrmDatabase::connect(config).await?;

        debug!("running database migrations");
        database.migrate().await?;

        let config_store = ConfigStore::new(database.clone());
        let log_sink = Arc::new(DatabaseLogSink::new(database.clone()));

        Ok(Self { database, config_store, log_sink })
    }

    pub async fn health_check(&self) -> Result<()> {
        self.database.health_check().await
    }
}
