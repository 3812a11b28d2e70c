use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LogicalModels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LogicalModels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LogicalModels::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(LogicalModels::Remark).text().null())
                    .col(ColumnDef::new(LogicalModels::DefaultMaxRetry).integer().not_null().default(2))
                    .col(
                        ColumnDef::new(LogicalModels::DefaultTimeoutSeconds)
                            .integer()
                            .not_null()
                            .default(120),
                    )
                    .col(ColumnDef::new(LogicalModels::Enabled).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(LogicalModels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LogicalModels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LogicalModels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum LogicalModels {
    Table,
    Id,
    Name,
    Remark,
    DefaultMaxRetry,
    DefaultTimeoutSeconds,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
