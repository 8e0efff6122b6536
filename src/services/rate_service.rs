//! NSL/USDT exchange rate management.
//!
//! The current rate is served from a Redis snapshot. Setting a rate writes the
//! new value through to the snapshot, so readers never fall back to the
//! database for a rate that was just replaced.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{CACHE_KEY_CURRENT_RATE, MAX_PAGE_SIZE, RATE_CACHE_TTL_SECONDS};
use crate::domain::ExchangeRate;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, ExchangeGateway, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Reference price from the exchange.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarketPrice {
    #[schema(example = "BTCUSDT")]
    pub symbol: String,
    #[schema(value_type = String, example = "64250.12")]
    pub price: Decimal,
}

#[async_trait]
pub trait RateService: Send + Sync {
    async fn current(&self) -> AppResult<ExchangeRate>;

    /// Most recent first
    async fn history(&self, limit: u64) -> AppResult<Vec<ExchangeRate>>;

    async fn set_rate(&self, admin_id: Uuid, rate: Decimal) -> AppResult<ExchangeRate>;

    async fn market_price(&self, symbol: String) -> AppResult<MarketPrice>;
}

/// Shared copy of the current rate.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateSnapshot: Send + Sync {
    async fn load(&self) -> AppResult<Option<ExchangeRate>>;

    async fn store(&self, rate: &ExchangeRate) -> AppResult<()>;
}

#[async_trait]
impl RateSnapshot for Cache {
    async fn load(&self) -> AppResult<Option<ExchangeRate>> {
        self.get(CACHE_KEY_CURRENT_RATE).await
    }

    async fn store(&self, rate: &ExchangeRate) -> AppResult<()> {
        self.set_with_ttl(CACHE_KEY_CURRENT_RATE, rate, RATE_CACHE_TTL_SECONDS)
            .await
    }
}

pub struct RateManager<U: UnitOfWork> {
    uow: Arc<U>,
    snapshot: Option<Arc<dyn RateSnapshot>>,
    gateway: Option<Arc<dyn ExchangeGateway>>,
}

impl<U: UnitOfWork> RateManager<U> {
    pub fn new(
        uow: Arc<U>,
        snapshot: Option<Arc<dyn RateSnapshot>>,
        gateway: Option<Arc<dyn ExchangeGateway>>,
    ) -> Self {
        Self {
            uow,
            snapshot,
            gateway,
        }
    }

    async fn cached(&self) -> Option<ExchangeRate> {
        let snapshot = self.snapshot.as_ref()?;
        match snapshot.load().await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(error = %e, "Rate cache read failed");
                None
            }
        }
    }

    async fn publish(&self, rate: &ExchangeRate) {
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.store(rate).await {
                tracing::error!(error = %e, rate_id = %rate.id, "Rate cache write failed");
            }
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> RateService for RateManager<U> {
    async fn current(&self) -> AppResult<ExchangeRate> {
        if let Some(rate) = self.cached().await {
            return Ok(rate);
        }

        let rate = self.uow.rates().current().await?.ok_or(AppError::NotFound)?;
        self.publish(&rate).await;
        Ok(rate)
    }

    async fn history(&self, limit: u64) -> AppResult<Vec<ExchangeRate>> {
        self.uow.rates().history(limit.clamp(1, MAX_PAGE_SIZE)).await
    }

    async fn set_rate(&self, admin_id: Uuid, rate: Decimal) -> AppResult<ExchangeRate> {
        ExchangeRate::validate_rate(rate)?;
        let saved = self.uow.rates().create(rate, Some(admin_id)).await?;
        self.publish(&saved).await;

        tracing::info!(admin_id = %admin_id, rate = %saved.rate, "Exchange rate updated");
        Ok(saved)
    }

    async fn market_price(&self, symbol: String) -> AppResult<MarketPrice> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| AppError::invalid_state("Exchange gateway is not configured"))?;
        let symbol = symbol.trim().to_ascii_uppercase();
        let price = gateway.market_price(&symbol).await?;
        Ok(MarketPrice { symbol, price })
    }
}
