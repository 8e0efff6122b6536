//! Migration: VIP products.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::VipLevel).integer().not_null().unique_key())
                    .col(ColumnDef::new(Products::PriceNsl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Products::DailyIncomeNsl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Products::DurationDays).integer().not_null())
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Products::VipLevel).gte(1))
                    .check(Expr::col(Products::PriceNsl).gt(0))
                    .check(Expr::col(Products::DailyIncomeNsl).gt(0))
                    .check(Expr::col(Products::DurationDays).gte(1))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum Products {
    Table,
    Id,
    Name,
    VipLevel,
    PriceNsl,
    DailyIncomeNsl,
    DurationDays,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
