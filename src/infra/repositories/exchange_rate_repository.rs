//! Exchange rate history. The newest row is the current rate.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::entities::exchange_rate::{self, ActiveModel, Entity as RateEntity};
use crate::config::{RATE_BASE, RATE_QUOTE};
use crate::domain::ExchangeRate;
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExchangeRateRepository: Send + Sync {
    async fn current(&self) -> AppResult<Option<ExchangeRate>>;

    /// Most recent rates first
    async fn history(&self, limit: u64) -> AppResult<Vec<ExchangeRate>>;

    async fn create(&self, rate: Decimal, set_by: Option<Uuid>) -> AppResult<ExchangeRate>;
}

/// SeaORM implementation of [`ExchangeRateRepository`].
pub struct ExchangeRateStore {
    db: DatabaseConnection,
}

impl ExchangeRateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExchangeRateRepository for ExchangeRateStore {
    async fn current(&self) -> AppResult<Option<ExchangeRate>> {
        Ok(self.history(1).await?.into_iter().next())
    }

    async fn history(&self, limit: u64) -> AppResult<Vec<ExchangeRate>> {
        let models = RateEntity::find()
            .filter(exchange_rate::Column::Base.eq(RATE_BASE))
            .filter(exchange_rate::Column::Quote.eq(RATE_QUOTE))
            .order_by_desc(exchange_rate::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(ExchangeRate::from).collect())
    }

    async fn create(&self, rate: Decimal, set_by: Option<Uuid>) -> AppResult<ExchangeRate> {
        let active_model = ActiveModel {
            id: Set(Uuid::new_v4()),
            base: Set(RATE_BASE.to_string()),
            quote: Set(RATE_QUOTE.to_string()),
            rate: Set(rate),
            set_by: Set(set_by),
            created_at: Set(Utc::now()),
        };
        let model = active_model.insert(&self.db).await?;
        Ok(ExchangeRate::from(model))
    }
}
