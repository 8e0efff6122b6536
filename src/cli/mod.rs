//! CLI module - Command-line interface for the application.
//!
//! - `serve` - Start the HTTP server
//! - `migrate` - Database migrations
//! - `jobs` - Payout worker and queue management
//! - `admin` - Bootstrap admins and products

pub mod args;

pub use args::{Cli, Commands};
