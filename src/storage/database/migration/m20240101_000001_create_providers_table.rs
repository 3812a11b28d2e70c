use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Providers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Providers::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Providers::Kind).string().not_null())
                    .col(ColumnDef::new(Providers::ApiKey).text().not_null())
                    .col(ColumnDef::new(Providers::BaseUrl).string().null())
                    .col(ColumnDef::new(Providers::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Providers::Priority).integer().not_null().default(0))
                    .col(ColumnDef::new(Providers::Weight).integer().not_null().default(1))
                    .col(ColumnDef::new(Providers::MaxRetries).integer().not_null().default(2))
                    .col(ColumnDef::new(Providers::TimeoutSeconds).integer().not_null().default(120))
                    .col(ColumnDef::new(Providers::RateLimit).integer().null())
                    .col(
                        ColumnDef::new(Providers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Providers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_providers_enabled")
                    .table(Providers::Table)
                    .col(Providers::Enabled)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Providers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Providers {
    Table,
    Id,
    Name,
    Kind,
    ApiKey,
    BaseUrl,
    Enabled,
    Priority,
    Weight,
    MaxRetries,
    TimeoutSeconds,
    RateLimit,
    CreatedAt,
    UpdatedAt,
}
