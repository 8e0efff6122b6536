//! Currencies, rounding rules, and the two-unit wallet.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::MONEY_SCALE;
use crate::errors::{AppError, AppResult};

/// Units a balance can be held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Platform unit for products, income, and bonuses
    Nsl,
    /// Stablecoin bridged to Binance
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Nsl => "NSL",
            Currency::Usdt => "USDT",
        }
    }

    /// The other unit of the pair.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Nsl => Currency::Usdt,
            Currency::Usdt => Currency::Nsl,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NSL" => Ok(Currency::Nsl),
            "USDT" => Ok(Currency::Usdt),
            other => Err(AppError::validation(format!("Unsupported currency: {}", other))),
        }
    }
}

/// Truncate an amount to the stored precision.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero)
}

/// `amount * percent / 100`, truncated to the stored precision.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

/// Reject zero, negative, and over-precise amounts.
pub fn ensure_positive(amount: Decimal, what: &str) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(format!("{} must be greater than zero", what)));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(AppError::validation(format!(
            "{} supports at most {} decimal places",
            what, MONEY_SCALE
        )));
    }
    Ok(())
}

/// Balances of one user in both units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct Wallet {
    pub nsl: Decimal,
    pub usdt: Decimal,
}

impl Wallet {
    pub fn new(nsl: Decimal, usdt: Decimal) -> Self {
        Self { nsl, usdt }
    }

    pub fn balance(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Nsl => self.nsl,
            Currency::Usdt => self.usdt,
        }
    }

    fn slot(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Nsl => &mut self.nsl,
            Currency::Usdt => &mut self.usdt,
        }
    }

    pub fn credit(&mut self, currency: Currency, amount: Decimal) -> AppResult<()> {
        ensure_positive(amount, "Amount")?;
        *self.slot(currency) += amount;
        Ok(())
    }

    /// Remove funds; the balance never goes below zero.
    pub fn debit(&mut self, currency: Currency, amount: Decimal) -> AppResult<()> {
        ensure_positive(amount, "Amount")?;
        let slot = self.slot(currency);
        if *slot < amount {
            return Err(AppError::InsufficientFunds);
        }
        *slot -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usdt".parse::<Currency>().unwrap(), Currency::Usdt);
        assert_eq!("NSL".parse::<Currency>().unwrap(), Currency::Nsl);
        assert!("BTC".parse::<Currency>().is_err());
    }

    #[test]
    fn test_currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Usdt).unwrap(), "\"USDT\"");
        assert_eq!(Currency::Nsl.counterpart(), Currency::Usdt);
    }

    #[test]
    fn test_percent_of_truncates() {
        assert_eq!(percent_of(dec("33.333333333"), dec("10")), dec("3.33333333"));
        assert_eq!(percent_of(dec("100"), dec("0")), Decimal::ZERO);
    }

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(dec("0.00000001"), "Amount").is_ok());
        assert!(ensure_positive(Decimal::ZERO, "Amount").is_err());
        assert!(ensure_positive(dec("-1"), "Amount").is_err());
        assert!(ensure_positive(dec("0.000000001"), "Amount").is_err());
        // trailing zeros do not count as precision
        assert!(ensure_positive(dec("1.0000000000"), "Amount").is_ok());
    }

    #[test]
    fn test_wallet_credit_and_debit() {
        let mut wallet = Wallet::new(dec("10"), dec("5"));
        wallet.credit(Currency::Usdt, dec("2.5")).unwrap();
        wallet.debit(Currency::Nsl, dec("10")).unwrap();

        assert_eq!(wallet.balance(Currency::Usdt), dec("7.5"));
        assert_eq!(wallet.balance(Currency::Nsl), Decimal::ZERO);
    }

    #[test]
    fn test_wallet_debit_never_overdraws() {
        let mut wallet = Wallet::new(dec("1"), Decimal::ZERO);
        let result = wallet.debit(Currency::Nsl, dec("1.00000001"));

        assert!(matches!(result, Err(AppError::InsufficientFunds)));
        assert_eq!(wallet.nsl, dec("1"));
    }
}
