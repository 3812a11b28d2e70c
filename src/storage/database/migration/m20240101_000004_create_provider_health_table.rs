use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_providers_table::Providers;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderHealth::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderHealth::ProviderId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderHealth::IsHealthy).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(ProviderHealth::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ProviderHealth::TotalChecks).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ProviderHealth::TotalFailures).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ProviderHealth::ResponseTimeMs).big_integer().null())
                    .col(ColumnDef::new(ProviderHealth::LastCheck).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(ProviderHealth::ErrorMessage).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_health_provider_id")
                            .from(ProviderHealth::Table, ProviderHealth::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderHealth::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderHealth {
    Table,
    ProviderId,
    IsHealthy,
    ConsecutiveFailures,
    TotalChecks,
    TotalFailures,
    ResponseTimeMs,
    LastCheck,
    ErrorMessage,
}
