//! Infrastructure layer - External systems integration
//!
//! - PostgreSQL connection, migrations and repositories
//! - Redis cache, wallet locks and rate-limit counters
//! - Binance exchange gateway
//! - Unit of Work for ledger transactions

pub mod binance;
pub mod cache;
pub mod db;
pub mod repositories;
pub mod unit_of_work;

pub use binance::{BinanceClient, DepositRecord, ExchangeGateway, NetworkRule};
pub use cache::{Cache, LockGuard, RateLimitStatus};
pub use db::{Database, Migrator};
pub use repositories::{
    ExchangeRateRepository, ExchangeRateStore, InvestmentRepository, InvestmentStore,
    ProductRepository, ProductStore, TransactionRepository, TransactionStore, UserRepository,
    UserStore,
};
pub use unit_of_work::{
    LedgerStore, Persistence, TransactionContext, TxFuture, TxInvestmentRepository,
    TxTransactionRepository, TxUserRepository, UnitOfWork,
};

#[cfg(any(test, feature = "test-utils"))]
pub use binance::MockExchangeGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::{
    MockExchangeRateRepository, MockInvestmentRepository, MockProductRepository,
    MockTransactionRepository, MockUserRepository,
};
