//! Investment repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::investment::{self, ActiveModel, Entity as InvestmentEntity};
use crate::domain::{Investment, InvestmentStatus, NewInvestment};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait InvestmentRepository: Send + Sync {
    /// All investments of a user, newest first
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Investment>>;

    async fn has_active(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;

    /// Active investments with a payout due at `now`
    async fn due_ids(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>>;

    /// Number of active investments and lifetime income of a user
    async fn earnings(&self, user_id: Uuid) -> AppResult<(u64, Decimal)>;
}

/// SeaORM implementation of [`InvestmentRepository`].
pub struct InvestmentStore {
    db: DatabaseConnection,
}

impl InvestmentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InvestmentRepository for InvestmentStore {
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Investment>> {
        let models = InvestmentEntity::find()
            .filter(investment::Column::UserId.eq(user_id))
            .order_by_desc(investment::Column::StartedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Investment::from).collect())
    }

    async fn has_active(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        active_investment_exists(&self.db, user_id, product_id).await
    }

    async fn due_ids(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let ids = InvestmentEntity::find()
            .select_only()
            .column(investment::Column::Id)
            .filter(investment::Column::Status.eq(InvestmentStatus::Active.as_str()))
            .filter(investment::Column::NextPayoutAt.lte(now))
            .order_by_asc(investment::Column::NextPayoutAt)
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn earnings(&self, user_id: Uuid) -> AppResult<(u64, Decimal)> {
        let investments = self.list_by_user(user_id).await?;
        let active = investments.iter().filter(|i| i.is_active()).count() as u64;
        let earned = investments.iter().map(|i| i.total_earned_nsl).sum();
        Ok((active, earned))
    }
}

pub(crate) async fn active_investment_exists<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let count = InvestmentEntity::find()
        .filter(investment::Column::UserId.eq(user_id))
        .filter(investment::Column::ProductId.eq(product_id))
        .filter(investment::Column::Status.eq(InvestmentStatus::Active.as_str()))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn insert_investment<C: ConnectionTrait>(
    db: &C,
    new: NewInvestment,
) -> AppResult<Investment> {
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(new.user_id),
        product_id: Set(new.product_id),
        vip_level: Set(new.vip_level),
        principal_nsl: Set(new.principal_nsl),
        daily_income_nsl: Set(new.daily_income_nsl),
        duration_days: Set(new.duration_days),
        payouts_made: Set(0),
        total_earned_nsl: Set(Decimal::ZERO),
        status: Set(InvestmentStatus::Active.as_str().to_string()),
        started_at: Set(new.started_at),
        next_payout_at: Set(new.next_payout_at),
        completed_at: Set(None),
    };

    let model = active_model.insert(db).await?;
    Ok(Investment::from(model))
}

pub(crate) async fn lock_investment<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> AppResult<Option<Investment>> {
    let result = InvestmentEntity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?;
    Ok(result.map(Investment::from))
}

/// Persist payout progress of a locked investment.
pub(crate) async fn save_progress<C: ConnectionTrait>(db: &C, inv: &Investment) -> AppResult<()> {
    let existing = InvestmentEntity::find_by_id(inv.id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.payouts_made = Set(inv.payouts_made);
    active.total_earned_nsl = Set(inv.total_earned_nsl);
    active.status = Set(inv.status.as_str().to_string());
    active.next_payout_at = Set(inv.next_payout_at);
    active.completed_at = Set(inv.completed_at);

    active.update(db).await?;
    Ok(())
}
