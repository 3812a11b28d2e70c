//! Orchestration root
//!
//! [`Gateway`] owns the configuration, the persistence layer, the health
//! store, and the dispatcher, and wires them together at startup: load
//! enabled provider rows into live adapters, seed health from the last run,
//! and hand a [`core::router::Dispatcher`] to the HTTP layer.

#![allow(dead_code)]

pub mod health;
pub mod providers;
pub mod router;
pub mod streaming;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::EntityTrait;
use tracing::{debug, info};

use crate::config::Config;
use crate::storage::StorageLayer;
use crate::storage::database::entities::provider as provider_entity;
use crate::utils::error::Result;

use health::{HealthStore, ProbeTarget, Prober};
use providers::{Provider, ProviderKind};
use router::{BindingSource, Dispatcher, RequestLogSink};

/// Top-level application object. Cheap to clone (everything inside is
/// already `Arc`-backed or itself `Clone`); one instance is shared across
/// every actix-web worker via `web::Data`.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<Config>,
    storage: StorageLayer,
    health: HealthStore,
    dispatcher: Arc<Dispatcher>,
    probe_targets: Arc<Vec<ProbeTarget>>,
}

impl Gateway {
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        debug!("initializing storage layer");
        let storage = StorageLayer::new(&config.database).await?;

        let health = HealthStore::new(config.router.max_consecutive_failures);
        storage.database.seed_health_store(&health).await?;

        let rows = provider_entity::Entity::find().all(storage.database.connection()).await?;

        let mut registry: HashMap<String, Provider> = HashMap::new();
        let mut probe_targets = Vec::new();
        for row in &rows {
            if !row.enabled {
                continue;
            }
            let kind: ProviderKind = row.kind.parse()?;
            let base_url = row.base_url.clone().unwrap_or_else(|| kind.default_base_url().to_string());
            let provider = Provider::new(kind, base_url, row.api_key.clone())?;
            probe_targets.push(ProbeTarget { provider_id: row.name.clone(), provider: provider.clone() });
            registry.insert(row.name.clone(), provider);
        }

        info!(count = registry.len(), "loaded provider instances");

        let binding_source: Arc<dyn BindingSource> = Arc::new(storage.config_store.clone());
        let log_sink: Arc<dyn RequestLogSink> = storage.log_sink.clone();
        let dispatcher = Arc::new(Dispatcher::new(registry, binding_source, health.clone(), log_sink));

        Ok(Self {
            config,
            storage,
            health,
            dispatcher,
            probe_targets: Arc::new(probe_targets),
        })
    }

    /// Spawn the background health prober. Call once after construction; the
    /// returned `JoinHandle` is detached by the caller on process shutdown.
    pub fn spawn_prober(&self) -> tokio::task::JoinHandle<()> {
        let prober = Prober::new(
            self.health.clone(),
            (*self.probe_targets).clone(),
            Duration::from_secs(self.config.router.health_check_interval_secs),
        );
        tokio::spawn(prober.run())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &StorageLayer {
        &self.storage
    }

    pub fn health(&self) -> &HealthStore {
        &self.health
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Aggregate process + dependency health for `GET /healthz`.
    pub async fn health_check(&self) -> HealthStatus {
        let storage_ok = self.storage.health_check().await.is_ok();
        HealthStatus {
            status: if storage_ok { "healthy".to_string() } else { "unhealthy".to_string() },
            timestamp: chrono::Utc::now(),
            providers: self.health.snapshot(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub providers: std::collections::HashMap<String, health::ProviderHealth>,
}
