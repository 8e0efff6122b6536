//! HTTP request handlers.

pub mod admin_handler;
pub mod auth_handler;
pub mod health_handler;
pub mod product_handler;
pub mod rate_handler;
pub mod user_handler;
pub mod wallet_handler;

pub use admin_handler::admin_routes;
pub use auth_handler::auth_routes;
pub use health_handler::health_routes;
pub use product_handler::{product_routes, purchase_routes};
pub use rate_handler::rate_routes;
pub use user_handler::{user_routes, user_security_routes};
pub use wallet_handler::{wallet_money_routes, wallet_routes};
