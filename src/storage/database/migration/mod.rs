use sea_orm_migration::prelude::*;

mod m20240101_000001_create_providers_table;
mod m20240101_000002_create_logical_models_table;
mod m20240101_000003_create_model_bindings_table;
mod m20240101_000004_create_provider_health_table;
mod m20240101_000005_create_request_logs_table;

/// Database migrator for SeaORM
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_providers_table::Migration),
            Box::new(m20240101_000002_create_logical_models_table::Migration),
            Box::new(m20240101_000003_create_model_bindings_table::Migration),
            Box::new(m20240101_000004_create_provider_health_table::Migration),
            Box::new(m20240101_000005_create_request_logs_table::Migration),
        ]
    }
}
