//! Migration: ledger transactions.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Transactions::UserId).uuid().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Transactions::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Transactions::Amount).decimal_len(20, 8).not_null())
                    .col(
                        ColumnDef::new(Transactions::Fee)
                            .decimal_len(20, 8)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Transactions::NetAmount).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Transactions::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Transactions::Reference).string_len(128).null())
                    .col(ColumnDef::new(Transactions::Address).string_len(128).null())
                    .col(ColumnDef::new(Transactions::Network).string_len(16).null())
                    .col(ColumnDef::new(Transactions::ExternalId).string_len(128).null())
                    .col(ColumnDef::new(Transactions::CounterCurrency).string_len(8).null())
                    .col(ColumnDef::new(Transactions::CounterAmount).decimal_len(20, 8).null())
                    .col(ColumnDef::new(Transactions::RelatedId).uuid().null())
                    .col(ColumnDef::new(Transactions::Note).text().null())
                    .col(ColumnDef::new(Transactions::ReviewedBy).uuid().null())
                    .col(
                        ColumnDef::new(Transactions::ReviewedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Transactions::Amount).gt(0))
                    .check(Expr::col(Transactions::Fee).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_created")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_status_kind")
                    .table(Transactions::Table)
                    .col(Transactions::Status)
                    .col(Transactions::Kind)
                    .to_owned(),
            )
            .await?;

        // One live deposit per exchange reference; rejected claims may be resubmitted.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_deposit_reference \
                 ON transactions (reference) \
                 WHERE kind = 'deposit' AND status <> 'rejected'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    Currency,
    Amount,
    Fee,
    NetAmount,
    Status,
    Reference,
    Address,
    Network,
    ExternalId,
    CounterCurrency,
    CounterAmount,
    RelatedId,
    Note,
    ReviewedBy,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}
