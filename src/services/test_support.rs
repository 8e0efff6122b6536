//! Unit of work double for service tests.
//!
//! Plain reads go to mockall repositories. Transaction bodies run against
//! [`MemoryLedger`], which keeps seeded rows in memory and discards writes
//! when the body fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Investment, InvestmentStatus, NewInvestment, NewTransaction, Transaction, User,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{
    ExchangeRateRepository, InvestmentRepository, LedgerStore, MockExchangeRateRepository,
    MockInvestmentRepository, MockProductRepository, MockTransactionRepository,
    MockUserRepository, ProductRepository, TransactionContext, TransactionRepository, TxFuture,
    UnitOfWork, UserRepository,
};

#[derive(Default)]
pub struct TestUnitOfWork {
    pub users: MockUserRepository,
    pub transactions: MockTransactionRepository,
    pub products: MockProductRepository,
    pub investments: MockInvestmentRepository,
    pub rates: MockExchangeRateRepository,
    pub ledger: MemoryLedger,
}

impl TestUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Arc<BuiltUnitOfWork> {
        Arc::new(BuiltUnitOfWork {
            users: Arc::new(self.users),
            transactions: Arc::new(self.transactions),
            products: Arc::new(self.products),
            investments: Arc::new(self.investments),
            rates: Arc::new(self.rates),
            ledger: Arc::new(self.ledger),
        })
    }
}

pub struct BuiltUnitOfWork {
    users: Arc<MockUserRepository>,
    transactions: Arc<MockTransactionRepository>,
    products: Arc<MockProductRepository>,
    investments: Arc<MockInvestmentRepository>,
    rates: Arc<MockExchangeRateRepository>,
    ledger: Arc<MemoryLedger>,
}

impl BuiltUnitOfWork {
    /// Rows as committed by the transactions run so far.
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }
}

#[async_trait]
impl UnitOfWork for BuiltUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn transactions(&self) -> Arc<dyn TransactionRepository> {
        self.transactions.clone()
    }

    fn products(&self) -> Arc<dyn ProductRepository> {
        self.products.clone()
    }

    fn investments(&self) -> Arc<dyn InvestmentRepository> {
        self.investments.clone()
    }

    fn rates(&self) -> Arc<dyn ExchangeRateRepository> {
        self.rates.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let before = self.ledger.rows().clone();
        let outcome = f(TransactionContext::new(&*self.ledger)).await;
        if outcome.is_err() {
            *self.ledger.rows() = before;
        }
        outcome
    }
}

#[derive(Debug, Clone, Default)]
struct LedgerRows {
    users: HashMap<Uuid, User>,
    transactions: HashMap<Uuid, Transaction>,
    investments: HashMap<Uuid, Investment>,
}

/// In-memory rows behind [`LedgerStore`].
#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<LedgerRows>,
}

impl MemoryLedger {
    fn rows(&self) -> MutexGuard<'_, LedgerRows> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn seed_user(&self, user: User) {
        self.rows().users.insert(user.id, user);
    }

    pub fn seed_transaction(&self, tx: Transaction) {
        self.rows().transactions.insert(tx.id, tx);
    }

    pub fn seed_investment(&self, investment: Investment) {
        self.rows().investments.insert(investment.id, investment);
    }

    pub fn user(&self, id: Uuid) -> User {
        self.rows().users.get(&id).cloned().expect("seeded user")
    }

    pub fn transaction(&self, id: Uuid) -> Transaction {
        self.rows().transactions.get(&id).cloned().expect("stored transaction")
    }

    pub fn investment(&self, id: Uuid) -> Investment {
        self.rows().investments.get(&id).cloned().expect("stored investment")
    }

    /// Ledger entries of one user, oldest first.
    pub fn transactions_of(&self, user_id: Uuid) -> Vec<Transaction> {
        let mut entries: Vec<Transaction> = self
            .rows()
            .transactions
            .values()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|tx| tx.created_at);
        entries
    }

    pub fn investments_of(&self, user_id: Uuid) -> Vec<Investment> {
        self.rows()
            .investments
            .values()
            .filter(|inv| inv.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn lock_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self
            .rows()
            .users
            .get(&id)
            .filter(|user| !user.is_deleted())
            .cloned())
    }

    async fn save_balances(&self, user: &User) -> AppResult<()> {
        let mut rows = self.rows();
        let stored = rows.users.get_mut(&user.id).ok_or(AppError::NotFound)?;
        stored.balance_nsl = user.balance_nsl;
        stored.balance_usdt = user.balance_usdt;
        stored.vip_level = user.vip_level;
        Ok(())
    }

    async fn lock_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        Ok(self.rows().transactions.get(&id).cloned())
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> AppResult<Transaction> {
        let now = Utc::now();
        let stored = Transaction {
            id: Uuid::new_v4(),
            user_id: tx.user_id,
            kind: tx.kind,
            currency: tx.currency,
            amount: tx.amount,
            fee: tx.fee,
            net_amount: tx.net_amount,
            status: tx.status,
            reference: tx.reference,
            address: tx.address,
            network: tx.network,
            external_id: None,
            counter_currency: tx.counter_currency,
            counter_amount: tx.counter_amount,
            related_id: tx.related_id,
            note: tx.note,
            reviewed_by: tx.reviewed_by,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows().transactions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_review(&self, tx: &Transaction) -> AppResult<()> {
        let mut rows = self.rows();
        let stored = rows.transactions.get_mut(&tx.id).ok_or(AppError::NotFound)?;
        stored.status = tx.status;
        stored.external_id = tx.external_id.clone();
        stored.note = tx.note.clone();
        stored.reviewed_by = tx.reviewed_by;
        stored.reviewed_at = tx.reviewed_at;
        stored.updated_at = tx.updated_at;
        Ok(())
    }

    async fn insert_investment(&self, new: NewInvestment) -> AppResult<Investment> {
        let mut rows = self.rows();
        let duplicate = rows.investments.values().any(|inv| {
            inv.user_id == new.user_id && inv.product_id == new.product_id && inv.is_active()
        });
        if duplicate {
            return Err(AppError::conflict("Active investment in this product"));
        }
        let stored = Investment {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            product_id: new.product_id,
            vip_level: new.vip_level,
            principal_nsl: new.principal_nsl,
            daily_income_nsl: new.daily_income_nsl,
            duration_days: new.duration_days,
            payouts_made: 0,
            total_earned_nsl: rust_decimal::Decimal::ZERO,
            status: InvestmentStatus::Active,
            started_at: new.started_at,
            next_payout_at: new.next_payout_at,
            completed_at: None,
        };
        rows.investments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn lock_investment(&self, id: Uuid) -> AppResult<Option<Investment>> {
        Ok(self.rows().investments.get(&id).cloned())
    }

    async fn save_progress(&self, investment: &Investment) -> AppResult<()> {
        let mut rows = self.rows();
        let stored = rows
            .investments
            .get_mut(&investment.id)
            .ok_or(AppError::NotFound)?;
        stored.payouts_made = investment.payouts_made;
        stored.total_earned_nsl = investment.total_earned_nsl;
        stored.status = investment.status;
        stored.next_payout_at = investment.next_payout_at;
        stored.completed_at = investment.completed_at;
        Ok(())
    }

    async fn has_active_investment(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        Ok(self.rows().investments.values().any(|inv| {
            inv.user_id == user_id && inv.product_id == product_id && inv.is_active()
        }))
    }
}
