//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::{
    AddressStatus, DocumentType, KycDetails, KycStatus, Network, User, UserRole,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    #[sea_orm(unique)]
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance_nsl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance_usdt: Decimal,
    pub vip_level: i32,
    pub kyc_status: String,
    pub kyc_full_name: Option<String>,
    pub kyc_document_type: Option<String>,
    pub kyc_document_number: Option<String>,
    pub kyc_country: Option<String>,
    pub kyc_rejection_reason: Option<String>,
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    /// Last TOTP step accepted, so a code works only once
    pub two_factor_last_step: Option<i64>,
    pub withdrawal_address: Option<String>,
    pub withdrawal_network: Option<String>,
    pub address_status: String,
    pub address_rejection_reason: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Soft delete timestamp (NULL = active, set = deleted)
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        let kyc = match (
            model.kyc_full_name,
            model.kyc_document_type.as_deref().and_then(DocumentType::parse),
            model.kyc_document_number,
            model.kyc_country,
        ) {
            (Some(full_name), Some(document_type), Some(document_number), Some(country)) => {
                Some(KycDetails {
                    full_name,
                    document_type,
                    document_number,
                    country,
                })
            }
            _ => None,
        };

        User {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            name: model.name,
            role: UserRole::from(model.role.as_str()),
            referral_code: model.referral_code,
            referred_by: model.referred_by,
            balance_nsl: model.balance_nsl,
            balance_usdt: model.balance_usdt,
            vip_level: model.vip_level,
            kyc_status: KycStatus::from(model.kyc_status.as_str()),
            kyc,
            kyc_rejection_reason: model.kyc_rejection_reason,
            two_factor_secret: model.two_factor_secret,
            two_factor_enabled: model.two_factor_enabled,
            withdrawal_address: model.withdrawal_address,
            withdrawal_network: model.withdrawal_network.and_then(|n| n.parse::<Network>().ok()),
            address_status: AddressStatus::from(model.address_status.as_str()),
            address_rejection_reason: model.address_rejection_reason,
            created_at: model.created_at,
            updated_at: model.updated_at,
            deleted_at: model.deleted_at,
        }
    }
}
