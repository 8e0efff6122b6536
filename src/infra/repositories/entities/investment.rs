//! Investment entity.

use sea_orm::entity::prelude::*;

use crate::domain::{Investment, InvestmentStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "investments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub vip_level: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub principal_nsl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub daily_income_nsl: Decimal,
    pub duration_days: i32,
    pub payouts_made: i32,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub total_earned_nsl: Decimal,
    pub status: String,
    pub started_at: DateTimeUtc,
    pub next_payout_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Investment {
    fn from(model: Model) -> Self {
        Investment {
            id: model.id,
            user_id: model.user_id,
            product_id: model.product_id,
            vip_level: model.vip_level,
            principal_nsl: model.principal_nsl,
            daily_income_nsl: model.daily_income_nsl,
            duration_days: model.duration_days,
            payouts_made: model.payouts_made,
            total_earned_nsl: model.total_earned_nsl,
            status: InvestmentStatus::from(model.status.as_str()),
            started_at: model.started_at,
            next_payout_at: model.next_payout_at,
            completed_at: model.completed_at,
        }
    }
}
