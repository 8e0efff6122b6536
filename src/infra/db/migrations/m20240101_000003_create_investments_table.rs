//! Migration: investments and their payout schedule.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;
use super::m20240101_000002_create_products_table::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Investments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Investments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Investments::UserId).uuid().not_null())
                    .col(ColumnDef::new(Investments::ProductId).uuid().not_null())
                    .col(ColumnDef::new(Investments::VipLevel).integer().not_null())
                    .col(ColumnDef::new(Investments::PrincipalNsl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Investments::DailyIncomeNsl).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Investments::DurationDays).integer().not_null())
                    .col(
                        ColumnDef::new(Investments::PayoutsMade)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Investments::TotalEarnedNsl)
                            .decimal_len(20, 8)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Investments::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Investments::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Investments::NextPayoutAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Investments::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .check(Expr::col(Investments::PayoutsMade).lte(Expr::col(Investments::DurationDays)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_investments_user")
                            .from(Investments::Table, Investments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_investments_product")
                            .from(Investments::Table, Investments::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_investments_user")
                    .table(Investments::Table)
                    .col(Investments::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_investments_due")
                    .table(Investments::Table)
                    .col(Investments::Status)
                    .col(Investments::NextPayoutAt)
                    .to_owned(),
            )
            .await?;

        // One running investment per user and product.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_investments_active_product \
                 ON investments (user_id, product_id) \
                 WHERE status = 'active'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Investments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Investments {
    Table,
    Id,
    UserId,
    ProductId,
    VipLevel,
    PrincipalNsl,
    DailyIncomeNsl,
    DurationDays,
    PayoutsMade,
    TotalEarnedNsl,
    Status,
    StartedAt,
    NextPayoutAt,
    CompletedAt,
}
