//! SalonMoney - VIP investment platform backend.
//!
//! Users hold NSL and USDT balances, buy VIP products that pay daily
//! income, earn referral bonuses, and move USDT in and out through a
//! Binance bridge with admin approval.
//!
//! # Layers
//!
//! - **cli** / **commands**: `serve`, `migrate`, `jobs`, `admin`
//! - **config**: environment configuration and constants
//! - **domain**: ledger rules and entities
//! - **services**: use cases over the Unit of Work
//! - **infra**: PostgreSQL, Redis, Binance
//! - **api**: HTTP handlers, middleware, routes
//! - **jobs**: apalis payout job
//! - **types**: pagination and response envelopes
//! - **errors**: `AppError` and its HTTP mapping

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

pub use api::AppState;
pub use config::Config;
pub use domain::{Currency, Password, User, UserRole};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
