//! SeaORM-backed persistence: connection, migrations, and the read-side
//! config store view (C2) and request-log sink (used by the dispatcher).

pub mod entities;
pub mod migration;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::core::router::{BindingSource, ModelBinding, RequestLogSink};
use crate::core::types::chat::ChatResponse;
use crate::core::types::context::RequestContext;
use crate::utils::error::{GatewayError, Result};

use entities::{logical_model, model_binding, provider, provider_health, request_log};
use migration::Migrator;

const CANDIDATE_CACHE_TTL: Duration = Duration::from_secs(30);
const MODEL_LIST_CACHE_TTL: Duration = Duration::from_secs(300);

/// SeaORM connection wrapper. Tries the configured backend first and, for a
/// `postgres` configuration, falls back to an on-disk SQLite file if the
/// connection cannot be established — mirroring the teacher's resilience
/// posture for local/dev environments without a Postgres instance running.
#[derive(Clone)]
pub struct SeaOrmDatabase {
    conn: DatabaseConnection,
}

impl SeaOrmDatabase {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match Database::connect(&config.url).await {
            Ok(conn) => Ok(Self { conn }),
            Err(e) if config.database_type == "postgres" => {
                warn!(error = %e, "postgres connection failed, falling back to sqlite");
                let conn = Database::connect("sqlite://gateway.db?mode=rwc")
                    .await
                    .map_err(|e| GatewayError::Internal(format!("sqlite fallback failed: {e}")))?;
                Ok(Self { conn })
            }
            Err(e) => Err(GatewayError::Internal(format!("database connection failed: {e}"))),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| GatewayError::Internal(format!("migration failed: {e}")))
    }

    pub async fn health_check(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Seed the health store from any rows persisted from a previous run, so
    /// the balancer doesn't treat every provider as freshly-healthy after a
    /// restart.
    pub async fn seed_health_store(&self, store: &crate::core::health::HealthStore) -> Result<()> {
        let providers = provider::Entity::find().all(&self.conn).await?;
        for p in providers {
            if let Some(health) = provider_health::Entity::find_by_id(p.id).one(&self.conn).await? {
                store.seed(health.to_domain(&p.name));
            }
        }
        Ok(())
    }
}

/// Read-only accessor over persisted providers/models/bindings, with
/// short-TTL caching over derived projections only — provider rows
/// themselves (credentials, endpoints) are never cached as objects, so a
/// credential rotation is visible within one request.
#[derive(Clone)]
pub struct ConfigStore {
    db: SeaOrmDatabase,
    candidates: Cache<String, Arc<Vec<ModelBinding>>>,
    model_names: Cache<(), Arc<Vec<String>>>,
}

impl ConfigStore {
    pub fn new(db: SeaOrmDatabase) -> Self {
        Self {
            db,
            candidates: Cache::builder().time_to_live(CANDIDATE_CACHE_TTL).build(),
            model_names: Cache::builder().time_to_live(MODEL_LIST_CACHE_TTL).build(),
        }
    }

    /// Enabled bindings for a logical model, joined against their provider's
    /// own enabled flag, weight, and priority.
    pub async fn candidate_bindings(&self, logical_model_name: &str) -> Result<Arc<Vec<ModelBinding>>> {
        if let Some(cached) = self.candidates.get(logical_model_name).await {
            return Ok(cached);
        }

        let Some(model) = logical_model::Entity::find()
            .filter(logical_model::Column::Name.eq(logical_model_name))
            .filter(logical_model::Column::Enabled.eq(true))
            .one(self.db.connection())
            .await?
        else {
            return Ok(Arc::new(Vec::new()));
        };

        let bindings = model_binding::Entity::find()
            .filter(model_binding::Column::LogicalModelId.eq(model.id))
            .filter(model_binding::Column::Enabled.eq(true))
            .find_also_related(provider::Entity)
            .all(self.db.connection())
            .await?;

        let candidates: Vec<ModelBinding> = bindings
            .into_iter()
            .filter_map(|(binding, prov)| {
                let prov = prov?;
                if !prov.enabled {
                    return None;
                }
                Some(ModelBinding {
                    provider_id: prov.name,
                    priority: prov.priority.max(0) as u32,
                    weight: binding.weight.max(0) as u32,
                })
            })
            .collect();

        let candidates = Arc::new(candidates);
        self.candidates.insert(logical_model_name.to_string(), candidates.clone()).await;
        Ok(candidates)
    }

    /// Every enabled logical model name, deduplicated, for `GET /v1/models`.
    pub async fn list_model_names(&self) -> Result<Arc<Vec<String>>> {
        if let Some(cached) = self.model_names.get(&()).await {
            return Ok(cached);
        }

        let models = logical_model::Entity::find()
            .filter(logical_model::Column::Enabled.eq(true))
            .all(self.db.connection())
            .await?;

        let names = Arc::new(models.into_iter().map(|m| m.name).collect());
        self.model_names.insert((), names.clone()).await;
        Ok(names)
    }

    /// Invalidate both caches; callers should invoke this after any admin
    /// write to providers, models, or bindings.
    pub fn invalidate_all(&self) {
        self.candidates.invalidate_all();
        self.model_names.invalidate_all();
    }
}

#[async_trait::async_trait]
impl BindingSource for ConfigStore {
    async fn candidates(&self, model: &str) -> Result<Vec<ModelBinding>> {
        Ok((*self.candidate_bindings(model).await?).clone())
    }
}

/// Writes the three terminal-outcome log rows the dispatcher and streaming
/// accountant produce, resolving a provider display name to its row id.
pub struct DatabaseLogSink {
    db: SeaOrmDatabase,
}

impl DatabaseLogSink {
    pub fn new(db: SeaOrmDatabase) -> Self {
        Self { db }
    }

    async fn provider_id_for(&self, name: &str) -> Option<i32> {
        provider::Entity::find()
            .filter(provider::Column::Name.eq(name))
            .one(self.db.connection())
            .await
            .ok()
            .flatten()
            .map(|p| p.id)
    }

    async fn insert(&self, am: request_log::ActiveModel) {
        if let Err(e) = am.insert(self.db.connection()).await {
            error!(error = %e, "failed to write request log row");
        }
    }
}

#[async_trait::async_trait]
impl RequestLogSink for DatabaseLogSink {
    async fn log_success(&self, ctx: &RequestContext, response: &ChatResponse, provider_id: &str, latency_ms: u64) {
        let usage = response.usage.unwrap_or_default();
        let am = request_log::ActiveModel {
            provider_id: Set(self.provider_id_for(provider_id).await),
            model: Set(response.model.clone()),
            endpoint: Set("/v1/chat/completions".to_string()),
            method: Set("POST".to_string()),
            status_code: Set(200),
            prompt_tokens: Set(Some(usage.prompt_tokens as i32)),
            completion_tokens: Set(Some(usage.completion_tokens as i32)),
            total_tokens: Set(Some(usage.total_tokens as i32)),
            latency_ms: Set(latency_ms as i64),
            error_message: Set(None),
            user_id: Set(ctx.user_id.clone()),
            ip_address: Set(ctx.client_ip.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        self.insert(am).await;
    }

    async fn log_streaming_success(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        model: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        latency_ms: u64,
    ) {
        let am = request_log::ActiveModel {
            provider_id: Set(self.provider_id_for(provider_id).await),
            model: Set(model.to_string()),
            endpoint: Set("/v1/chat/completions".to_string()),
            method: Set("POST".to_string()),
            status_code: Set(200),
            prompt_tokens: Set(Some(prompt_tokens as i32)),
            completion_tokens: Set(Some(completion_tokens as i32)),
            total_tokens: Set(Some((prompt_tokens + completion_tokens) as i32)),
            latency_ms: Set(latency_ms as i64),
            error_message: Set(None),
            user_id: Set(ctx.user_id.clone()),
            ip_address: Set(ctx.client_ip.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        self.insert(am).await;
    }

    async fn log_failure(&self, ctx: &RequestContext, model: &str, error: &GatewayError, latency_ms: u64) {
        info!(model, error = %error, "logging failed request");
        let am = request_log::ActiveModel {
            provider_id: Set(None),
            model: Set(model.to_string()),
            endpoint: Set("/v1/chat/completions".to_string()),
            method: Set("POST".to_string()),
            status_code: Set(error_status_code(error)),
            prompt_tokens: Set(None),
            completion_tokens: Set(None),
            total_tokens: Set(None),
            latency_ms: Set(latency_ms as i64),
            error_message: Set(Some(error.to_string())),
            user_id: Set(ctx.user_id.clone()),
            ip_address: Set(ctx.client_ip.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        self.insert(am).await;
    }
}

fn error_status_code(error: &GatewayError) -> i32 {
    use actix_web::ResponseError;
    error.status_code().as_u16() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn seeded_db() -> (tempfile::TempDir, SeaOrmDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            database_type: "sqlite".to_string(),
        };
        let db = SeaOrmDatabase::connect(&config).await.unwrap();
        db.migrate().await.unwrap();

        let provider = provider::ActiveModel {
            name: Set("p1".to_string()),
            kind: Set("openai".to_string()),
            api_key: Set("sk-test".to_string()),
            base_url: Set(None),
            enabled: Set(true),
            priority: Set(0),
            weight: Set(1),
            max_retries: Set(2),
            timeout_seconds: Set(30),
            rate_limit: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(db.connection())
        .await
        .unwrap();

        let model = logical_model::ActiveModel {
            name: Set("gpt-4o".to_string()),
            remark: Set(None),
            default_max_retry: Set(2),
            default_timeout_seconds: Set(30),
            enabled: Set(true),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(db.connection())
        .await
        .unwrap();

        model_binding::ActiveModel {
            logical_model_id: Set(model.id),
            provider_id: Set(provider.id),
            provider_model: Set("gpt-4o-2024-08-06".to_string()),
            weight: Set(5),
            supports_tool_call: Set(true),
            supports_structured_output: Set(true),
            supports_image: Set(false),
            enabled: Set(true),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(db.connection())
        .await
        .unwrap();

        (dir, db)
    }

    #[tokio::test]
    async fn config_store_resolves_enabled_bindings_for_a_model() {
        let (_dir, db) = seeded_db().await;
        let store = ConfigStore::new(db);

        let candidates = store.candidate_bindings("gpt-4o").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].provider_id, "p1");
        assert_eq!(candidates[0].weight, 5);

        let names = store.list_model_names().await.unwrap();
        assert_eq!(&**names, &["gpt-4o".to_string()]);
    }

    #[tokio::test]
    async fn config_store_returns_empty_for_unknown_model() {
        let (_dir, db) = seeded_db().await;
        let store = ConfigStore::new(db);
        let candidates = store.candidate_bindings("no-such-model").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn log_sink_persists_a_success_row_resolving_provider_id() {
        let (_dir, db) = seeded_db().await;
        let sink = DatabaseLogSink::new(db.clone());

        let ctx = RequestContext::new();
        let response = ChatResponse {
            id: ChatResponse::new_id(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt-4o".to_string(),
            choices: Vec::new(),
            usage: Some(crate::core::types::chat::Usage::new(3, 4)),
            provider: "p1".to_string(),
            latency_ms: 12,
        };
        sink.log_success(&ctx, &response, "p1", 12).await;

        let rows = request_log::Entity::find().all(db.connection()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_tokens, Some(7));
        assert!(rows[0].provider_id.is_some());
    }
}
