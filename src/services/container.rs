//! Service Container - Centralized service access with parallel execution support.
//!
//! Handlers depend on [`ServiceContainer`] only, so API tests can swap in
//! `MockServiceContainer` or hand-written fakes.

use std::future::Future;
use std::sync::Arc;

use super::{
    AddressService, ApprovalService, AuthService, IncomeService, KycService, ProductService,
    RateService, SecurityService, UserService, WalletService,
};
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Cache, ExchangeGateway, Persistence};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    /// Two-factor enrollment
    fn security(&self) -> Arc<dyn SecurityService>;

    fn kyc(&self) -> Arc<dyn KycService>;

    /// Withdrawal address registration and review
    fn addresses(&self) -> Arc<dyn AddressService>;

    fn wallet(&self) -> Arc<dyn WalletService>;

    /// Admin review of deposits and withdrawals, balance adjustments
    fn approvals(&self) -> Arc<dyn ApprovalService>;

    fn products(&self) -> Arc<dyn ProductService>;

    fn income(&self) -> Arc<dyn IncomeService>;

    fn rates(&self) -> Arc<dyn RateService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserService>,
    security: Arc<dyn SecurityService>,
    kyc: Arc<dyn KycService>,
    addresses: Arc<dyn AddressService>,
    wallet: Arc<dyn WalletService>,
    approvals: Arc<dyn ApprovalService>,
    products: Arc<dyn ProductService>,
    income: Arc<dyn IncomeService>,
    rates: Arc<dyn RateService>,
}

impl Services {
    /// Wire every service onto one database connection.
    ///
    /// `cache` backs the exchange rate cache; `gateway` is `None` when the
    /// exchange bridge runs in manual mode.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        cache: Option<Cache>,
        config: Config,
        gateway: Option<Arc<dyn ExchangeGateway>>,
    ) -> Self {
        use super::{
            AddressManager, ApprovalManager, Authenticator, IncomeManager, KycManager,
            ProductManager, RateManager, RateSnapshot, SecurityManager, UserManager,
            WalletManager,
        };

        let uow = Arc::new(Persistence::new(db));
        let ledger = config.ledger.clone();

        Self {
            users: Arc::new(UserManager::new(uow.clone())),
            security: Arc::new(SecurityManager::new(uow.clone())),
            kyc: Arc::new(KycManager::new(uow.clone())),
            addresses: Arc::new(AddressManager::new(uow.clone(), gateway.clone())),
            wallet: Arc::new(WalletManager::new(uow.clone(), &ledger)),
            approvals: Arc::new(ApprovalManager::new(uow.clone(), gateway.clone())),
            products: Arc::new(ProductManager::new(uow.clone(), &ledger)),
            income: Arc::new(IncomeManager::new(uow.clone())),
            rates: Arc::new(RateManager::new(
                uow.clone(),
                cache.map(|c| Arc::new(c) as Arc<dyn RateSnapshot>),
                gateway,
            )),
            auth: Arc::new(Authenticator::new(uow, config)),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.users.clone()
    }

    fn security(&self) -> Arc<dyn SecurityService> {
        self.security.clone()
    }

    fn kyc(&self) -> Arc<dyn KycService> {
        self.kyc.clone()
    }

    fn addresses(&self) -> Arc<dyn AddressService> {
        self.addresses.clone()
    }

    fn wallet(&self) -> Arc<dyn WalletService> {
        self.wallet.clone()
    }

    fn approvals(&self) -> Arc<dyn ApprovalService> {
        self.approvals.clone()
    }

    fn products(&self) -> Arc<dyn ProductService> {
        self.products.clone()
    }

    fn income(&self) -> Arc<dyn IncomeService> {
        self.income.clone()
    }

    fn rates(&self) -> Arc<dyn RateService> {
        self.rates.clone()
    }
}

/// Parallel execution utilities for running independent operations concurrently.
pub mod parallel {
    use super::*;
    use tokio::try_join;

    /// Execute two independent async operations in parallel.
    ///
    /// If either operation fails, the error is returned immediately.
    ///
    /// # Example
    /// ```ignore
    /// let (user, earnings) = parallel::join2(
    ///     users.find_by_id(id),
    ///     investments.earnings(id),
    /// ).await?;
    /// ```
    pub async fn join2<F1, F2, T1, T2>(f1: F1, f2: F2) -> AppResult<(T1, T2)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
    {
        try_join!(f1, f2)
    }

    /// Execute operations in parallel with a concurrency limit.
    ///
    /// Results come back in completion order, not input order. The first
    /// error stops the run.
    ///
    /// # Example
    /// ```ignore
    /// let outcomes = parallel::join_all_limited(
    ///     due_ids.into_iter().map(|id| pay_one(id)),
    ///     PAYOUT_CONCURRENCY,
    /// ).await?;
    /// ```
    pub async fn join_all_limited<F, T, I>(futures: I, limit: usize) -> AppResult<Vec<T>>
    where
        F: Future<Output = AppResult<T>>,
        I: IntoIterator<Item = F>,
    {
        use futures::stream::{self, TryStreamExt};

        let futures: Vec<AppResult<F>> = futures.into_iter().map(Ok).collect();
        stream::iter(futures)
            .try_buffer_unordered(limit.max(1))
            .try_collect()
            .await
    }
}
