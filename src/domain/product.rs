//! VIP products sold to users.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::ensure_positive;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "VIP 1")]
    pub name: String,
    #[schema(example = 1)]
    pub vip_level: i32,
    #[schema(value_type = String, example = "100")]
    pub price_nsl: Decimal,
    #[schema(value_type = String, example = "3.5")]
    pub daily_income_nsl: Decimal,
    #[schema(example = 30)]
    pub duration_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn ensure_purchasable(&self) -> AppResult<()> {
        if !self.is_active {
            return Err(AppError::invalid_state("Product is not available"));
        }
        Ok(())
    }

    /// Total income paid over the full duration.
    pub fn total_return(&self) -> Decimal {
        self.daily_income_nsl * Decimal::from(self.duration_days)
    }
}

/// Terms of a new product.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct ProductDraft {
    #[schema(example = "VIP 1")]
    pub name: String,
    #[schema(example = 1)]
    pub vip_level: i32,
    #[schema(value_type = String, example = "100")]
    pub price_nsl: Decimal,
    #[schema(value_type = String, example = "3.5")]
    pub daily_income_nsl: Decimal,
    #[schema(example = 30)]
    pub duration_days: i32,
}

impl ProductDraft {
    pub fn validate(&self) -> AppResult<()> {
        validate_terms(
            Some(&self.name),
            Some(self.vip_level),
            Some(self.price_nsl),
            Some(self.daily_income_nsl),
            Some(self.duration_days),
        )
    }
}

/// Partial update of a product; absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub vip_level: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price_nsl: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub daily_income_nsl: Option<Decimal>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

impl ProductChanges {
    pub fn validate(&self) -> AppResult<()> {
        validate_terms(
            self.name.as_ref(),
            self.vip_level,
            self.price_nsl,
            self.daily_income_nsl,
            self.duration_days,
        )
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(level) = self.vip_level {
            product.vip_level = level;
        }
        if let Some(price) = self.price_nsl {
            product.price_nsl = price;
        }
        if let Some(income) = self.daily_income_nsl {
            product.daily_income_nsl = income;
        }
        if let Some(days) = self.duration_days {
            product.duration_days = days;
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
        product.updated_at = Utc::now();
    }
}

fn validate_terms(
    name: Option<&String>,
    vip_level: Option<i32>,
    price: Option<Decimal>,
    daily_income: Option<Decimal>,
    duration_days: Option<i32>,
) -> AppResult<()> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Product name is required"));
        }
    }
    if matches!(vip_level, Some(level) if level < 1) {
        return Err(AppError::validation("VIP level must be at least 1"));
    }
    if let Some(price) = price {
        ensure_positive(price, "Price")?;
    }
    if let Some(income) = daily_income {
        ensure_positive(income, "Daily income")?;
    }
    if matches!(duration_days, Some(days) if days < 1) {
        return Err(AppError::validation("Duration must be at least one day"));
    }
    Ok(())
}
