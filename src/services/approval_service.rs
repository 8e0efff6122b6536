//! Admin approval workflow for deposits and withdrawals, plus manual
//! balance adjustments.
//!
//! Deposits are credited on approval. Withdrawals hold the gross amount
//! when requested; approval submits the net amount to Binance and
//! rejection returns the hold.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::money::ensure_positive;
use crate::domain::{
    Currency, NewTransaction, Transaction, TransactionFilter, TransactionKind,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{ExchangeGateway, UnitOfWork};
use crate::types::PaginationParams;

#[async_trait]
pub trait ApprovalService: Send + Sync {
    /// Transactions across all users, newest first
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        params: PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)>;

    async fn approve(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Transaction>;

    async fn reject(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        reason: String,
    ) -> AppResult<Transaction>;

    /// Credit (positive) or debit (negative) a balance with an audit entry
    async fn adjust_balance(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        currency: Currency,
        amount: Decimal,
        note: String,
    ) -> AppResult<Transaction>;
}

pub struct ApprovalManager<U: UnitOfWork> {
    uow: Arc<U>,
    gateway: Option<Arc<dyn ExchangeGateway>>,
}

impl<U: UnitOfWork> ApprovalManager<U> {
    pub fn new(uow: Arc<U>, gateway: Option<Arc<dyn ExchangeGateway>>) -> Self {
        Self { uow, gateway }
    }

    async fn load(&self, transaction_id: Uuid) -> AppResult<Transaction> {
        self.uow
            .transactions()
            .find_by_id(transaction_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// The exchange must have credited at least the claimed amount.
    async fn confirm_deposit(&self, tx: &Transaction) -> AppResult<()> {
        let Some(gateway) = &self.gateway else {
            return Ok(());
        };
        let reference = tx
            .reference
            .as_deref()
            .ok_or_else(|| AppError::invalid_state("Deposit has no exchange reference"))?;

        let record = gateway
            .find_deposit(reference)
            .await?
            .ok_or_else(|| AppError::invalid_state("Deposit not found on the exchange"))?;

        if !record.is_credited() {
            return Err(AppError::invalid_state(
                "Deposit has not been credited on the exchange yet",
            ));
        }
        if record.amount < tx.amount {
            tracing::warn!(
                transaction_id = %tx.id,
                claimed = %tx.amount,
                received = %record.amount,
                "Deposit amount mismatch"
            );
            return Err(AppError::invalid_state(format!(
                "Exchange received {} USDT, less than the claimed amount",
                record.amount
            )));
        }
        Ok(())
    }

    async fn approve_deposit(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Transaction> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut tx = ctx.transactions().lock(transaction_id).await?;
                    tx.approve(admin_id, note)?;

                    let mut user = ctx.users().lock(tx.user_id).await?;
                    let mut wallet = user.wallet();
                    wallet.credit(Currency::Usdt, tx.net_amount)?;
                    user.set_wallet(wallet);
                    ctx.users().save_balances(&user).await?;

                    ctx.transactions().save_review(&tx).await?;
                    Ok(tx)
                })
            })
            .await
    }

    async fn approve_withdrawal(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Transaction> {
        let gateway = self.gateway.clone();

        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut tx = ctx.transactions().lock(transaction_id).await?;
                    tx.ensure_reviewable()?;

                    if let Some(gateway) = gateway {
                        let (network, address) = match (tx.network, tx.address.as_deref()) {
                            (Some(network), Some(address)) => (network, address),
                            _ => {
                                return Err(AppError::invalid_state(
                                    "Withdrawal has no destination address",
                                ))
                            }
                        };
                        let external_id = gateway
                            .submit_withdrawal(tx.id, network, address, tx.net_amount)
                            .await?;
                        tx.external_id = Some(external_id);
                    }

                    tx.approve(admin_id, note)?;
                    if let Err(e) = ctx.transactions().save_review(&tx).await {
                        tracing::error!(
                            transaction_id = %tx.id,
                            external_id = ?tx.external_id,
                            error = %e,
                            "Withdrawal sent to exchange but approval was not saved"
                        );
                        return Err(e);
                    }
                    Ok(tx)
                })
            })
            .await
    }
}

#[async_trait]
impl<U: UnitOfWork> ApprovalService for ApprovalManager<U> {
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        params: PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)> {
        self.uow.transactions().list(&filter, &params).await
    }

    async fn approve(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Transaction> {
        let tx = self.load(transaction_id).await?;
        tx.ensure_reviewable()?;

        let approved = match tx.kind {
            TransactionKind::Deposit => {
                self.confirm_deposit(&tx).await?;
                self.approve_deposit(admin_id, transaction_id, note).await?
            }
            TransactionKind::Withdrawal => {
                self.approve_withdrawal(admin_id, transaction_id, note).await?
            }
            other => {
                return Err(AppError::invalid_state(format!(
                    "{} transactions are not reviewed",
                    other
                )))
            }
        };

        tracing::info!(
            transaction_id = %approved.id,
            user_id = %approved.user_id,
            admin_id = %admin_id,
            kind = %approved.kind,
            amount = %approved.net_amount,
            "Transaction approved"
        );
        Ok(approved)
    }

    async fn reject(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        reason: String,
    ) -> AppResult<Transaction> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::validation("A rejection reason is required"));
        }

        let rejected = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut tx = ctx.transactions().lock(transaction_id).await?;
                    tx.reject(admin_id, reason)?;

                    if let Some(refund) = tx.refund_amount() {
                        let mut user = ctx.users().lock(tx.user_id).await?;
                        let mut wallet = user.wallet();
                        wallet.credit(tx.currency, refund)?;
                        user.set_wallet(wallet);
                        ctx.users().save_balances(&user).await?;
                    }

                    ctx.transactions().save_review(&tx).await?;
                    Ok(tx)
                })
            })
            .await?;

        tracing::info!(
            transaction_id = %rejected.id,
            user_id = %rejected.user_id,
            admin_id = %admin_id,
            kind = %rejected.kind,
            refunded = rejected.refund_amount().is_some(),
            "Transaction rejected"
        );
        Ok(rejected)
    }

    async fn adjust_balance(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        currency: Currency,
        amount: Decimal,
        note: String,
    ) -> AppResult<Transaction> {
        ensure_positive(amount.abs(), "Adjustment amount")?;
        let note = note.trim().to_string();
        if note.is_empty() {
            return Err(AppError::validation("A note is required for adjustments"));
        }

        let tx = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut user = ctx.users().lock(user_id).await?;
                    let mut wallet = user.wallet();
                    if amount.is_sign_negative() {
                        wallet.debit(currency, amount.abs())?;
                    } else {
                        wallet.credit(currency, amount)?;
                    }
                    user.set_wallet(wallet);
                    ctx.users().save_balances(&user).await?;

                    ctx.transactions()
                        .create(NewTransaction::adjustment(user_id, currency, amount, admin_id, note))
                        .await
                })
            })
            .await?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id = %user_id,
            admin_id = %admin_id,
            currency = %currency,
            amount = %amount,
            "Balance adjusted"
        );
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::fixtures;
    use crate::domain::{Network, TransactionStatus, User};
    use crate::infra::{DepositRecord, MockExchangeGateway};
    use crate::services::test_support::{BuiltUnitOfWork, TestUnitOfWork};
    use chrono::Utc;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pending(kind: TransactionKind) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind,
            currency: Currency::Usdt,
            amount: dec("50"),
            fee: Decimal::ZERO,
            net_amount: dec("50"),
            status: TransactionStatus::Pending,
            reference: (kind == TransactionKind::Deposit).then(|| "0xabc".to_string()),
            address: (kind == TransactionKind::Withdrawal)
                .then(|| "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".to_string()),
            network: (kind == TransactionKind::Withdrawal).then_some(Network::Trc20),
            external_id: None,
            counter_currency: None,
            counter_amount: None,
            related_id: None,
            note: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn uow_with(tx: Transaction) -> Arc<BuiltUnitOfWork> {
        let mut uow = TestUnitOfWork::new();
        uow.transactions
            .expect_find_by_id()
            .returning(move |_| Ok(Some(tx.clone())));
        uow.build()
    }

    /// The owner of `tx` plus `tx` itself, both in the ledger. The plain read
    /// keeps returning the entry as first seeded.
    fn ledger_with(user: &User, tx: &mut Transaction) -> Arc<BuiltUnitOfWork> {
        tx.user_id = user.id;
        let mut uow = TestUnitOfWork::new();
        let snapshot = tx.clone();
        uow.transactions
            .expect_find_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        uow.ledger.seed_user(user.clone());
        uow.ledger.seed_transaction(tx.clone());
        uow.build()
    }

    fn with_fee(mut tx: Transaction, fee: &str) -> Transaction {
        tx.fee = dec(fee);
        tx.net_amount = tx.amount - tx.fee;
        tx
    }

    fn gateway_with_deposit(record: Option<DepositRecord>) -> Arc<dyn ExchangeGateway> {
        let mut gateway = MockExchangeGateway::new();
        gateway
            .expect_find_deposit()
            .withf(|reference| reference == "0xabc")
            .returning(move |_| Ok(record.clone()));
        Arc::new(gateway)
    }

    #[tokio::test]
    async fn test_approve_missing_transaction() {
        let mut uow = TestUnitOfWork::new();
        uow.transactions.expect_find_by_id().returning(|_| Ok(None));

        let service = ApprovalManager::new(uow.build(), None);
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_approve_already_reviewed() {
        let mut tx = pending(TransactionKind::Deposit);
        tx.status = TransactionStatus::Approved;

        let service = ApprovalManager::new(uow_with(tx), None);
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_instant_kinds_cannot_be_approved() {
        let mut tx = pending(TransactionKind::Purchase);
        tx.status = TransactionStatus::Completed;

        let service = ApprovalManager::new(uow_with(tx), None);
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_deposit_unknown_to_exchange() {
        let service = ApprovalManager::new(
            uow_with(pending(TransactionKind::Deposit)),
            Some(gateway_with_deposit(None)),
        );
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_deposit_not_yet_credited() {
        let record = DepositRecord {
            amount: dec("50"),
            status: 0,
        };
        let service = ApprovalManager::new(
            uow_with(pending(TransactionKind::Deposit)),
            Some(gateway_with_deposit(Some(record))),
        );
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_deposit_short_amount() {
        let record = DepositRecord {
            amount: dec("49.99"),
            status: 1,
        };
        let service = ApprovalManager::new(
            uow_with(pending(TransactionKind::Deposit)),
            Some(gateway_with_deposit(Some(record))),
        );
        let err = service
            .approve(Uuid::new_v4(), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_confirmed_deposit_credits_net_amount() {
        let mut user = fixtures::user();
        user.balance_usdt = dec("5");
        let mut tx = with_fee(pending(TransactionKind::Deposit), "0.5");
        let uow = ledger_with(&user, &mut tx);
        let record = DepositRecord {
            amount: dec("50"),
            status: 1,
        };
        let service = ApprovalManager::new(uow.clone(), Some(gateway_with_deposit(Some(record))));
        let admin = Uuid::new_v4();

        let approved = service.approve(admin, tx.id, None).await.unwrap();

        assert_eq!(approved.status, TransactionStatus::Approved);
        assert_eq!(uow.ledger().user(user.id).balance_usdt, dec("54.5"));
        let stored = uow.ledger().transaction(tx.id);
        assert_eq!(stored.status, TransactionStatus::Approved);
        assert_eq!(stored.reviewed_by, Some(admin));
    }

    #[tokio::test]
    async fn test_second_approval_is_invalid_state() {
        let user = fixtures::user();
        let mut tx = pending(TransactionKind::Deposit);
        let uow = ledger_with(&user, &mut tx);
        let service = ApprovalManager::new(uow.clone(), None);

        service.approve(Uuid::new_v4(), tx.id, None).await.unwrap();
        let err = service
            .approve(Uuid::new_v4(), tx.id, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(uow.ledger().user(user.id).balance_usdt, dec("50"));
    }

    #[tokio::test]
    async fn test_withdrawal_approval_records_exchange_id() {
        let user = fixtures::user();
        let mut tx = with_fee(pending(TransactionKind::Withdrawal), "2.5");
        let uow = ledger_with(&user, &mut tx);

        let mut gateway = MockExchangeGateway::new();
        gateway
            .expect_submit_withdrawal()
            .withf(|_, network, address, amount| {
                *network == Network::Trc20
                    && address == "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE"
                    && *amount == dec("47.5")
            })
            .times(1)
            .returning(|_, _, _, _| Ok("wd-1".into()));
        let service = ApprovalManager::new(uow.clone(), Some(Arc::new(gateway)));

        let approved = service.approve(Uuid::new_v4(), tx.id, None).await.unwrap();

        assert_eq!(approved.external_id.as_deref(), Some("wd-1"));
        let stored = uow.ledger().transaction(tx.id);
        assert_eq!(stored.status, TransactionStatus::Approved);
        assert_eq!(stored.external_id.as_deref(), Some("wd-1"));
        assert_eq!(uow.ledger().user(user.id).balance_usdt, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_exchange_submission_keeps_withdrawal_pending() {
        let user = fixtures::user();
        let mut tx = pending(TransactionKind::Withdrawal);
        let uow = ledger_with(&user, &mut tx);

        let mut gateway = MockExchangeGateway::new();
        gateway
            .expect_submit_withdrawal()
            .returning(|_, _, _, _| Err(AppError::external("insufficient exchange balance")));
        let service = ApprovalManager::new(uow.clone(), Some(Arc::new(gateway)));

        let err = service
            .approve(Uuid::new_v4(), tx.id, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalService(_)));
        assert_eq!(uow.ledger().transaction(tx.id).status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejected_withdrawal_refunds_gross_amount() {
        let mut user = fixtures::user();
        user.balance_usdt = dec("10");
        let mut tx = with_fee(pending(TransactionKind::Withdrawal), "2.5");
        let uow = ledger_with(&user, &mut tx);
        let service = ApprovalManager::new(uow.clone(), None);

        let rejected = service
            .reject(Uuid::new_v4(), tx.id, " wrong network ".into())
            .await
            .unwrap();

        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert_eq!(rejected.note.as_deref(), Some("wrong network"));
        assert_eq!(uow.ledger().user(user.id).balance_usdt, dec("60"));
        assert_eq!(
            uow.ledger().transaction(tx.id).status,
            TransactionStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_rejected_deposit_credits_nothing() {
        let user = fixtures::user();
        let mut tx = pending(TransactionKind::Deposit);
        let uow = ledger_with(&user, &mut tx);
        let service = ApprovalManager::new(uow.clone(), None);

        service
            .reject(Uuid::new_v4(), tx.id, "unknown reference".into())
            .await
            .unwrap();

        assert_eq!(uow.ledger().user(user.id).balance_usdt, Decimal::ZERO);
        let again = service
            .reject(Uuid::new_v4(), tx.id, "unknown reference".into())
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let service = ApprovalManager::new(TestUnitOfWork::new().build(), None);
        let err = service
            .reject(Uuid::new_v4(), Uuid::new_v4(), "  ".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_adjustment_validation() {
        let service = ApprovalManager::new(TestUnitOfWork::new().build(), None);

        let zero = service
            .adjust_balance(Uuid::new_v4(), Uuid::new_v4(), Currency::Nsl, Decimal::ZERO, "x".into())
            .await
            .unwrap_err();
        assert!(matches!(zero, AppError::Validation(_)));

        let no_note = service
            .adjust_balance(Uuid::new_v4(), Uuid::new_v4(), Currency::Nsl, dec("-5"), " ".into())
            .await
            .unwrap_err();
        assert!(matches!(no_note, AppError::Validation(_)));

        let missing = service
            .adjust_balance(Uuid::new_v4(), Uuid::new_v4(), Currency::Nsl, dec("-5"), "fix".into())
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_adjustment_moves_balance_and_logs_entry() {
        let mut user = fixtures::user();
        user.balance_nsl = dec("20");
        let user_id = user.id;
        let uow = TestUnitOfWork::new();
        uow.ledger.seed_user(user);
        let uow = uow.build();
        let service = ApprovalManager::new(uow.clone(), None);
        let admin = Uuid::new_v4();

        let tx = service
            .adjust_balance(admin, user_id, Currency::Nsl, dec("-12.5"), "duplicate payout".into())
            .await
            .unwrap();
        assert_eq!(tx.kind, TransactionKind::Adjustment);
        assert_eq!(tx.reviewed_by, Some(admin));
        assert_eq!(uow.ledger().user(user_id).balance_nsl, dec("7.5"));

        let err = service
            .adjust_balance(admin, user_id, Currency::Nsl, dec("-8"), "again".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(uow.ledger().user(user_id).balance_nsl, dec("7.5"));
        assert_eq!(uow.ledger().transactions_of(user_id).len(), 1);
    }
}
