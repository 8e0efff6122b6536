//! Migration: exchange rate history.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExchangeRates::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ExchangeRates::Base).string_len(8).not_null())
                    .col(ColumnDef::new(ExchangeRates::Quote).string_len(8).not_null())
                    .col(ColumnDef::new(ExchangeRates::Rate).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(ExchangeRates::SetBy).uuid().null())
                    .col(
                        ColumnDef::new(ExchangeRates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(ExchangeRates::Rate).gt(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_rates_pair_created")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::Base)
                    .col(ExchangeRates::Quote)
                    .col(ExchangeRates::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ExchangeRates {
    Table,
    Id,
    Base,
    Quote,
    Rate,
    SetBy,
    CreatedAt,
}
