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
                    .table(RequestLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RequestLogs::ProviderId).integer().null())
                    .col(ColumnDef::new(RequestLogs::Model).string().not_null())
                    .col(ColumnDef::new(RequestLogs::Endpoint).string().not_null())
                    .col(ColumnDef::new(RequestLogs::Method).string().not_null())
                    .col(ColumnDef::new(RequestLogs::StatusCode).integer().not_null())
                    .col(ColumnDef::new(RequestLogs::PromptTokens).integer().null())
                    .col(ColumnDef::new(RequestLogs::CompletionTokens).integer().null())
                    .col(ColumnDef::new(RequestLogs::TotalTokens).integer().null())
                    .col(ColumnDef::new(RequestLogs::LatencyMs).big_integer().not_null())
                    .col(ColumnDef::new(RequestLogs::ErrorMessage).text().null())
                    .col(ColumnDef::new(RequestLogs::UserId).string().null())
                    .col(ColumnDef::new(RequestLogs::IpAddress).string().null())
                    .col(
                        ColumnDef::new(RequestLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_logs_provider_id")
                            .from(RequestLogs::Table, RequestLogs::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_request_logs_created_at")
                    .table(RequestLogs::Table)
                    .col(RequestLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_request_logs_model")
                    .table(RequestLogs::Table)
                    .col(RequestLogs::Model)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RequestLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RequestLogs {
    Table,
    Id,
    ProviderId,
    Model,
    Endpoint,
    Method,
    StatusCode,
    PromptTokens,
    CompletionTokens,
    TotalTokens,
    LatencyMs,
    ErrorMessage,
    UserId,
    IpAddress,
    CreatedAt,
}
