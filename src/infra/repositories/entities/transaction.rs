//! Ledger transaction entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Currency, Network, Transaction, TransactionKind, TransactionStatus};
use crate::errors::AppError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub net_amount: Decimal,
    pub status: String,
    pub reference: Option<String>,
    pub address: Option<String>,
    pub network: Option<String>,
    pub external_id: Option<String>,
    pub counter_currency: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub counter_amount: Option<Decimal>,
    pub related_id: Option<Uuid>,
    pub note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = TransactionKind::parse(&model.kind).ok_or_else(|| {
            AppError::internal(format!("Unknown transaction kind: {}", model.kind))
        })?;
        let status = TransactionStatus::parse(&model.status).ok_or_else(|| {
            AppError::internal(format!("Unknown transaction status: {}", model.status))
        })?;
        let currency = model
            .currency
            .parse::<Currency>()
            .map_err(|_| AppError::internal(format!("Unknown currency: {}", model.currency)))?;

        Ok(Transaction {
            id: model.id,
            user_id: model.user_id,
            kind,
            currency,
            amount: model.amount,
            fee: model.fee,
            net_amount: model.net_amount,
            status,
            reference: model.reference,
            address: model.address,
            network: model.network.and_then(|n| n.parse::<Network>().ok()),
            external_id: model.external_id,
            counter_currency: model.counter_currency.and_then(|c| c.parse::<Currency>().ok()),
            counter_amount: model.counter_amount,
            related_id: model.related_id,
            note: model.note,
            reviewed_by: model.reviewed_by,
            reviewed_at: model.reviewed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
