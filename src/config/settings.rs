//! Application settings loaded from environment variables.

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::constants::{
    DEFAULT_BINANCE_BASE_URL, DEFAULT_DATABASE_URL, DEFAULT_DEPOSIT_FEE_PERCENT,
    DEFAULT_JWT_EXPIRATION_HOURS, DEFAULT_MIN_DEPOSIT, DEFAULT_MIN_WITHDRAWAL, DEFAULT_REDIS_URL,
    DEFAULT_REFERRAL_BONUS_PERCENT, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    DEFAULT_WITHDRAWAL_FEE_PERCENT, DEFAULT_WITHDRAWAL_MIN_FEE, MIN_JWT_SECRET_LENGTH,
};

/// Fee and limit settings used by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    pub withdrawal_fee_percent: Decimal,
    pub withdrawal_min_fee: Decimal,
    pub min_withdrawal: Decimal,
    pub min_deposit: Decimal,
    pub deposit_fee_percent: Decimal,
    pub referral_bonus_percent: Decimal,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            withdrawal_fee_percent: decimal_const(DEFAULT_WITHDRAWAL_FEE_PERCENT),
            withdrawal_min_fee: decimal_const(DEFAULT_WITHDRAWAL_MIN_FEE),
            min_withdrawal: decimal_const(DEFAULT_MIN_WITHDRAWAL),
            min_deposit: decimal_const(DEFAULT_MIN_DEPOSIT),
            deposit_fee_percent: decimal_const(DEFAULT_DEPOSIT_FEE_PERCENT),
            referral_bonus_percent: decimal_const(DEFAULT_REFERRAL_BONUS_PERCENT),
        }
    }
}

impl LedgerSettings {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            withdrawal_fee_percent: env_decimal("WITHDRAWAL_FEE_PERCENT", defaults.withdrawal_fee_percent),
            withdrawal_min_fee: env_decimal("WITHDRAWAL_MIN_FEE", defaults.withdrawal_min_fee),
            min_withdrawal: env_decimal("MIN_WITHDRAWAL", defaults.min_withdrawal),
            min_deposit: env_decimal("MIN_DEPOSIT", defaults.min_deposit),
            deposit_fee_percent: env_decimal("DEPOSIT_FEE_PERCENT", defaults.deposit_fee_percent),
            referral_bonus_percent: env_decimal("REFERRAL_BONUS_PERCENT", defaults.referral_bonus_percent),
        }
    }
}

/// Binance API credentials. Both keys must be present to enable the gateway.
#[derive(Clone)]
pub struct BinanceSettings {
    pub api_key: Option<String>,
    api_secret: Option<String>,
    pub base_url: String,
}

impl std::fmt::Debug for BinanceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BinanceSettings {
    pub fn new(api_key: Option<String>, api_secret: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            api_secret,
            base_url,
        }
    }

    /// Key pair when the gateway is enabled, `None` in manual mode.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials().is_some()
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub ledger: LedgerSettings,
    pub binance: BinanceSettings,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("ledger", &self.ledger)
            .field("binance", &self.binance)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set or is too short (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let binance = BinanceSettings::new(
            env::var("BINANCE_API_KEY").ok(),
            env::var("BINANCE_API_SECRET").ok(),
            env::var("BINANCE_BASE_URL").unwrap_or_else(|_| DEFAULT_BINANCE_BASE_URL.to_string()),
        );
        if !binance.is_enabled() {
            tracing::warn!("Binance credentials not set, deposits and withdrawals run in manual mode");
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            ledger: LedgerSettings::from_env(),
            binance,
        }
    }

    /// Build a configuration for tests without touching the environment.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            ledger: LedgerSettings::default(),
            binance: BinanceSettings::new(None, None, DEFAULT_BINANCE_BASE_URL.to_string()),
        }
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(raw.trim()).unwrap_or_else(|_| {
            tracing::warn!(key = key, value = %raw, "Invalid decimal setting, using default");
            default
        }),
        Err(_) => default,
    }
}

fn decimal_const(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_default()
}
