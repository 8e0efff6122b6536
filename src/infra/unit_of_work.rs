//! Unit of Work: repository access and database transactions.
//!
//! Reads go through the plain repositories. Every balance mutation runs in
//! [`UnitOfWork::transaction`], locks the rows it changes with
//! `SELECT ... FOR UPDATE`, and commits the balance change together with the
//! ledger entry that explains it.

use async_trait::async_trait;
use sea_orm::{AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    self, ExchangeRateRepository, ExchangeRateStore, InvestmentRepository, InvestmentStore,
    ProductRepository, ProductStore, TransactionRepository, TransactionStore, UserRepository,
    UserStore,
};
use crate::domain::{Investment, NewInvestment, NewTransaction, Transaction, User};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by a transaction body.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic `transaction` method; test
/// doubles implement it by hand.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn transactions(&self) -> Arc<dyn TransactionRepository>;

    fn products(&self) -> Arc<dyn ProductRepository>;

    fn investments(&self) -> Arc<dyn InvestmentRepository>;

    fn rates(&self) -> Arc<dyn ExchangeRateRepository>;

    /// Run `f` in a read-committed transaction, committing on `Ok` and
    /// rolling back on `Err`.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Row operations available inside an open transaction.
///
/// Locks taken here are held until the surrounding
/// [`UnitOfWork::transaction`] commits or rolls back.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Active user row, locked. `None` for missing or soft-deleted users.
    async fn lock_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Write balances and VIP level of a locked user.
    async fn save_balances(&self, user: &User) -> AppResult<()>;

    async fn lock_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>>;

    async fn insert_transaction(&self, tx: NewTransaction) -> AppResult<Transaction>;

    /// Write the review outcome of a locked transaction.
    async fn save_review(&self, tx: &Transaction) -> AppResult<()>;

    async fn insert_investment(&self, new: NewInvestment) -> AppResult<Investment>;

    async fn lock_investment(&self, id: Uuid) -> AppResult<Option<Investment>>;

    /// Write payout progress of a locked investment.
    async fn save_progress(&self, investment: &Investment) -> AppResult<()>;

    async fn has_active_investment(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;
}

/// Repository access bound to one open transaction.
pub struct TransactionContext<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> TransactionContext<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { store: self.store }
    }

    pub fn transactions(&self) -> TxTransactionRepository<'_> {
        TxTransactionRepository { store: self.store }
    }

    pub fn investments(&self) -> TxInvestmentRepository<'_> {
        TxInvestmentRepository { store: self.store }
    }
}

/// [`LedgerStore`] over a SeaORM transaction.
struct SqlLedger<'a> {
    txn: &'a DatabaseTransaction,
}

#[async_trait]
impl LedgerStore for SqlLedger<'_> {
    async fn lock_user(&self, id: Uuid) -> AppResult<Option<User>> {
        repositories::lock_user(self.txn, id).await
    }

    async fn save_balances(&self, user: &User) -> AppResult<()> {
        repositories::save_balances(self.txn, user).await
    }

    async fn lock_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        repositories::lock_transaction(self.txn, id).await
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> AppResult<Transaction> {
        repositories::insert_transaction(self.txn, tx).await
    }

    async fn save_review(&self, tx: &Transaction) -> AppResult<()> {
        repositories::save_review(self.txn, tx).await
    }

    async fn insert_investment(&self, new: NewInvestment) -> AppResult<Investment> {
        repositories::insert_investment(self.txn, new).await
    }

    async fn lock_investment(&self, id: Uuid) -> AppResult<Option<Investment>> {
        repositories::lock_investment(self.txn, id).await
    }

    async fn save_progress(&self, investment: &Investment) -> AppResult<()> {
        repositories::save_progress(self.txn, investment).await
    }

    async fn has_active_investment(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        repositories::active_investment_exists(self.txn, user_id, product_id).await
    }
}

/// SeaORM-backed unit of work.
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
    transaction_repo: Arc<TransactionStore>,
    product_repo: Arc<ProductStore>,
    investment_repo: Arc<InvestmentStore>,
    rate_repo: Arc<ExchangeRateStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            user_repo: Arc::new(UserStore::new(db.clone())),
            transaction_repo: Arc::new(TransactionStore::new(db.clone())),
            product_repo: Arc::new(ProductStore::new(db.clone())),
            investment_repo: Arc::new(InvestmentStore::new(db.clone())),
            rate_repo: Arc::new(ExchangeRateStore::new(db.clone())),
            db,
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn transactions(&self) -> Arc<dyn TransactionRepository> {
        self.transaction_repo.clone()
    }

    fn products(&self) -> Arc<dyn ProductRepository> {
        self.product_repo.clone()
    }

    fn investments(&self) -> Arc<dyn InvestmentRepository> {
        self.investment_repo.clone()
    }

    fn rates(&self) -> Arc<dyn ExchangeRateRepository> {
        self.rate_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::ReadCommitted), Some(AccessMode::ReadWrite))
            .await?;

        let outcome = {
            let store = SqlLedger { txn: &txn };
            f(TransactionContext::new(&store)).await
        };

        match outcome {
            Ok(result) => {
                txn.commit().await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Users inside a transaction.
pub struct TxUserRepository<'a> {
    store: &'a dyn LedgerStore,
}

impl TxUserRepository<'_> {
    /// Lock an active user row until the transaction ends.
    pub async fn lock(&self, id: Uuid) -> AppResult<User> {
        self.store.lock_user(id).await?.ok_or(AppError::NotFound)
    }

    /// Like [`lock`](Self::lock), but `None` for missing or soft-deleted users.
    pub async fn lock_if_active(&self, id: Uuid) -> AppResult<Option<User>> {
        self.store.lock_user(id).await
    }

    /// Persist balances and VIP level of a user locked in this transaction.
    pub async fn save_balances(&self, user: &User) -> AppResult<()> {
        self.store.save_balances(user).await
    }
}

/// Ledger entries inside a transaction.
pub struct TxTransactionRepository<'a> {
    store: &'a dyn LedgerStore,
}

impl TxTransactionRepository<'_> {
    pub async fn lock(&self, id: Uuid) -> AppResult<Transaction> {
        self.store
            .lock_transaction(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(&self, tx: NewTransaction) -> AppResult<Transaction> {
        self.store.insert_transaction(tx).await
    }

    pub async fn save_review(&self, tx: &Transaction) -> AppResult<()> {
        self.store.save_review(tx).await
    }
}

/// Investments inside a transaction.
pub struct TxInvestmentRepository<'a> {
    store: &'a dyn LedgerStore,
}

impl TxInvestmentRepository<'_> {
    pub async fn create(&self, new: NewInvestment) -> AppResult<Investment> {
        self.store.insert_investment(new).await
    }

    pub async fn lock(&self, id: Uuid) -> AppResult<Investment> {
        self.store
            .lock_investment(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn save_progress(&self, investment: &Investment) -> AppResult<()> {
        self.store.save_progress(investment).await
    }

    /// Checked after the buyer row is locked, so concurrent purchases serialize.
    pub async fn has_active(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        self.store.has_active_investment(user_id, product_id).await
    }
}
