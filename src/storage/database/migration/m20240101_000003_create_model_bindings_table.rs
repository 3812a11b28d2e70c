use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_providers_table::Providers;
use super::m20240101_000002_create_logical_models_table::LogicalModels;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModelBindings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModelBindings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModelBindings::LogicalModelId).integer().not_null())
                    .col(ColumnDef::new(ModelBindings::ProviderId).integer().not_null())
                    .col(ColumnDef::new(ModelBindings::ProviderModel).string().not_null())
                    .col(ColumnDef::new(ModelBindings::Weight).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(ModelBindings::SupportsToolCall)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ModelBindings::SupportsStructuredOutput)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ModelBindings::SupportsImage)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ModelBindings::Enabled).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(ModelBindings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_bindings_logical_model_id")
                            .from(ModelBindings::Table, ModelBindings::LogicalModelId)
                            .to(LogicalModels::Table, LogicalModels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_bindings_provider_id")
                            .from(ModelBindings::Table, ModelBindings::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_model_bindings_logical_model_id")
                    .table(ModelBindings::Table)
                    .col(ModelBindings::LogicalModelId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_model_bindings_model_provider")
                    .table(ModelBindings::Table)
                    .col(ModelBindings::LogicalModelId)
                    .col(ModelBindings::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModelBindings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ModelBindings {
    Table,
    Id,
    LogicalModelId,
    ProviderId,
    ProviderModel,
    Weight,
    SupportsToolCall,
    SupportsStructuredOutput,
    SupportsImage,
    Enabled,
    CreatedAt,
}
