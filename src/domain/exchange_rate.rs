//! Admin-managed NSL/USDT exchange rate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::{ensure_positive, round_money, Currency};
use crate::errors::{AppError, AppResult};

/// USDT paid for one NSL, as set by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExchangeRate {
    pub id: Uuid,
    #[schema(example = "NSL")]
    pub base: String,
    #[schema(example = "USDT")]
    pub quote: String,
    #[schema(value_type = String, example = "0.25")]
    pub rate: Decimal,
    pub set_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn validate_rate(rate: Decimal) -> AppResult<()> {
        ensure_positive(rate, "Rate")
    }

    /// Amount of the other currency received for `amount` of `from`.
    pub fn convert(&self, from: Currency, amount: Decimal) -> AppResult<Decimal> {
        ensure_positive(amount, "Amount")?;
        let converted = match from {
            Currency::Nsl => round_money(amount * self.rate),
            Currency::Usdt => {
                if self.rate.is_zero() {
                    return Err(AppError::internal("Exchange rate is zero"));
                }
                round_money(amount / self.rate)
            }
        };
        if converted.is_zero() {
            return Err(AppError::validation("Amount is too small to convert"));
        }
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rate(value: &str) -> ExchangeRate {
        ExchangeRate {
            id: Uuid::new_v4(),
            base: "NSL".into(),
            quote: "USDT".into(),
            rate: dec(value),
            set_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_nsl_to_usdt_multiplies() {
        assert_eq!(rate("0.25").convert(Currency::Nsl, dec("10")).unwrap(), dec("2.5"));
    }

    #[test]
    fn test_usdt_to_nsl_divides_and_truncates() {
        assert_eq!(rate("3").convert(Currency::Usdt, dec("1")).unwrap(), dec("0.33333333"));
    }

    #[test]
    fn test_dust_is_rejected() {
        let err = rate("0.00000001").convert(Currency::Nsl, dec("0.5")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_rate_must_be_positive() {
        assert!(ExchangeRate::validate_rate(dec("0")).is_err());
        assert!(ExchangeRate::validate_rate(dec("1.2")).is_ok());
    }
}
