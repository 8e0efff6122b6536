//! Commands module - CLI command implementations.

pub mod admin;
pub mod jobs;
pub mod migrate;
pub mod serve;
