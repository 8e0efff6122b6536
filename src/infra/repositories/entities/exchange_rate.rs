//! Exchange rate history entity.

use sea_orm::entity::prelude::*;

use crate::domain::ExchangeRate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub base: String,
    pub quote: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub rate: Decimal,
    pub set_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ExchangeRate {
    fn from(model: Model) -> Self {
        ExchangeRate {
            id: model.id,
            base: model.base,
            quote: model.quote,
            rate: model.rate,
            set_by: model.set_by,
            created_at: model.created_at,
        }
    }
}
