//! Repository layer - Data access abstraction
//!
//! Each repository has a trait for dependency injection and a `*Store`
//! backed by SeaORM. Functions generic over `ConnectionTrait` are shared
//! with the unit of work so the same queries run inside a transaction.

pub(crate) mod entities;
mod exchange_rate_repository;
mod investment_repository;
mod product_repository;
mod transaction_repository;
mod user_repository;

pub use exchange_rate_repository::{ExchangeRateRepository, ExchangeRateStore};
pub use investment_repository::{InvestmentRepository, InvestmentStore};
pub use product_repository::{ProductRepository, ProductStore};
pub use transaction_repository::{TransactionRepository, TransactionStore};
pub use user_repository::{UserRepository, UserStore};

pub(crate) use investment_repository::{
    active_investment_exists, insert_investment, lock_investment, save_progress,
};
pub(crate) use transaction_repository::{insert_transaction, lock_transaction, save_review};
pub(crate) use user_repository::{lock_user, save_balances};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use exchange_rate_repository::MockExchangeRateRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use investment_repository::MockInvestmentRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use product_repository::MockProductRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use transaction_repository::MockTransactionRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
