//! Migration: users with balances, KYC, two-factor, and withdrawal address.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Role).string_len(16).not_null().default("user"))
                    .col(
                        ColumnDef::new(Users::ReferralCode)
                            .string_len(16)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::ReferredBy).uuid().null())
                    .col(
                        ColumnDef::new(Users::BalanceNsl)
                            .decimal_len(20, 8)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::BalanceUsdt)
                            .decimal_len(20, 8)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::VipLevel).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Users::KycStatus)
                            .string_len(16)
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Users::KycFullName).string().null())
                    .col(ColumnDef::new(Users::KycDocumentType).string_len(32).null())
                    .col(ColumnDef::new(Users::KycDocumentNumber).string_len(64).null())
                    .col(ColumnDef::new(Users::KycCountry).string_len(2).null())
                    .col(ColumnDef::new(Users::KycRejectionReason).text().null())
                    .col(ColumnDef::new(Users::TwoFactorSecret).string_len(64).null())
                    .col(
                        ColumnDef::new(Users::TwoFactorEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Users::TwoFactorLastStep).big_integer().null())
                    .col(ColumnDef::new(Users::WithdrawalAddress).string_len(128).null())
                    .col(ColumnDef::new(Users::WithdrawalNetwork).string_len(16).null())
                    .col(
                        ColumnDef::new(Users::AddressStatus)
                            .string_len(16)
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Users::AddressRejectionReason).text().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Users::DeletedAt).timestamp_with_time_zone().null())
                    .check(Expr::col(Users::BalanceNsl).gte(0))
                    .check(Expr::col(Users::BalanceUsdt).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_referred_by")
                            .from(Users::Table, Users::ReferredBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_deleted_at")
                    .table(Users::Table)
                    .col(Users::DeletedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_referred_by")
                    .table(Users::Table)
                    .col(Users::ReferredBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_kyc_status")
                    .table(Users::Table)
                    .col(Users::KycStatus)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    Role,
    ReferralCode,
    ReferredBy,
    BalanceNsl,
    BalanceUsdt,
    VipLevel,
    KycStatus,
    KycFullName,
    KycDocumentType,
    KycDocumentNumber,
    KycCountry,
    KycRejectionReason,
    TwoFactorSecret,
    TwoFactorEnabled,
    TwoFactorLastStep,
    WithdrawalAddress,
    WithdrawalNetwork,
    AddressStatus,
    AddressRejectionReason,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
