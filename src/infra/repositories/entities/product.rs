//! VIP product entity.

use sea_orm::entity::prelude::*;

use crate::domain::Product;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub vip_level: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price_nsl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub daily_income_nsl: Decimal,
    pub duration_days: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Product {
    fn from(model: Model) -> Self {
        Product {
            id: model.id,
            name: model.name,
            vip_level: model.vip_level,
            price_nsl: model.price_nsl,
            daily_income_nsl: model.daily_income_nsl,
            duration_days: model.duration_days,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
