//! Ledger transaction repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use uuid::Uuid;

use super::entities::transaction::{self, ActiveModel, Entity as TransactionEntity};
use crate::domain::{
    NewTransaction, Transaction, TransactionFilter, TransactionKind, TransactionStatus,
};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Read access and balance-neutral inserts. Entries that move a balance are
/// written through the unit of work.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Transaction>>;

    /// Page of transactions, newest first
    async fn list(
        &self,
        filter: &TransactionFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)>;

    /// Whether a non-rejected deposit already claims this exchange reference
    async fn deposit_reference_in_use(&self, reference: &str) -> AppResult<bool>;

    /// Insert an entry that does not change any balance yet
    async fn create(&self, tx: NewTransaction) -> AppResult<Transaction>;
}

/// SeaORM implementation of [`TransactionRepository`].
pub struct TransactionStore {
    db: DatabaseConnection,
}

impl TransactionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn filtered(filter: &TransactionFilter) -> Select<TransactionEntity> {
    let mut query = TransactionEntity::find();
    if let Some(user_id) = filter.user_id {
        query = query.filter(transaction::Column::UserId.eq(user_id));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(transaction::Column::Kind.eq(kind.as_str()));
    }
    if let Some(status) = filter.status {
        query = query.filter(transaction::Column::Status.eq(status.as_str()));
    }
    query
}

#[async_trait]
impl TransactionRepository for TransactionStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        TransactionEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)> {
        let paginator = filtered(filter)
            .order_by_desc(transaction::Column::CreatedAt)
            .order_by_desc(transaction::Column::Id)
            .paginate(&self.db, params.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page() - 1).await?;

        let items = models
            .into_iter()
            .map(Transaction::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn deposit_reference_in_use(&self, reference: &str) -> AppResult<bool> {
        let count = TransactionEntity::find()
            .filter(
                Condition::all()
                    .add(transaction::Column::Kind.eq(TransactionKind::Deposit.as_str()))
                    .add(transaction::Column::Reference.eq(reference))
                    .add(transaction::Column::Status.ne(TransactionStatus::Rejected.as_str())),
            )
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, tx: NewTransaction) -> AppResult<Transaction> {
        insert_transaction(&self.db, tx).await
    }
}

pub(crate) async fn insert_transaction<C: ConnectionTrait>(
    db: &C,
    tx: NewTransaction,
) -> AppResult<Transaction> {
    let now = Utc::now();
    let reviewed_at = tx.reviewed_by.map(|_| now);
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(tx.user_id),
        kind: Set(tx.kind.as_str().to_string()),
        currency: Set(tx.currency.as_str().to_string()),
        amount: Set(tx.amount),
        fee: Set(tx.fee),
        net_amount: Set(tx.net_amount),
        status: Set(tx.status.as_str().to_string()),
        reference: Set(tx.reference),
        address: Set(tx.address),
        network: Set(tx.network.map(|n| n.as_str().to_string())),
        external_id: Set(None),
        counter_currency: Set(tx.counter_currency.map(|c| c.as_str().to_string())),
        counter_amount: Set(tx.counter_amount),
        related_id: Set(tx.related_id),
        note: Set(tx.note),
        reviewed_by: Set(tx.reviewed_by),
        reviewed_at: Set(reviewed_at),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = active_model.insert(db).await?;
    Transaction::try_from(model)
}

pub(crate) async fn lock_transaction<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> AppResult<Option<Transaction>> {
    TransactionEntity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?
        .map(Transaction::try_from)
        .transpose()
}

/// Persist the review outcome of a locked transaction.
pub(crate) async fn save_review<C: ConnectionTrait>(db: &C, tx: &Transaction) -> AppResult<()> {
    let existing = TransactionEntity::find_by_id(tx.id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.status = Set(tx.status.as_str().to_string());
    active.external_id = Set(tx.external_id.clone());
    active.note = Set(tx.note.clone());
    active.reviewed_by = Set(tx.reviewed_by);
    active.reviewed_at = Set(tx.reviewed_at);
    active.updated_at = Set(tx.updated_at);

    active.update(db).await?;
    Ok(())
}
