//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.
//! Enum-like columns are stored as their lowercase names.

pub mod exchange_rate;
pub mod investment;
pub mod product;
pub mod transaction;
pub mod user;
