//! Wallet: balances, ledger history, deposit and withdrawal requests, and
//! currency conversion.
//!
//! Every balance change runs in one database transaction that locks the
//! user row, applies the change, and inserts the ledger entry.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth_service::check_totp;
use super::container::parallel;
use crate::config::LedgerSettings;
use crate::domain::{
    Currency, FeeSchedule, NewTransaction, Transaction, TransactionFilter, TransactionKind,
    TransactionStatus, User,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::PaginationParams;

/// Longest accepted exchange transaction id
const MAX_REFERENCE_LENGTH: usize = 128;

/// Balances and earnings overview.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletSummary {
    #[schema(value_type = String, example = "150.25")]
    pub balance_nsl: Decimal,
    #[schema(value_type = String, example = "42")]
    pub balance_usdt: Decimal,
    pub vip_level: i32,
    pub active_investments: u64,
    /// Income received from all investments
    #[schema(value_type = String, example = "12.5")]
    pub total_earned_nsl: Decimal,
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn wallet(&self, user_id: Uuid) -> AppResult<WalletSummary>;

    /// The user's ledger, newest first
    async fn transactions(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
        status: Option<TransactionStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)>;

    /// Claim a USDT deposit made on the exchange; credited on approval
    async fn request_deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: String,
    ) -> AppResult<Transaction>;

    /// Hold `amount` USDT and queue a withdrawal to the verified address
    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        totp_code: Option<String>,
    ) -> AppResult<Transaction>;

    /// Exchange between NSL and USDT at the current rate
    async fn convert(&self, user_id: Uuid, from: Currency, amount: Decimal)
        -> AppResult<Transaction>;
}

pub struct WalletManager<U: UnitOfWork> {
    uow: Arc<U>,
    fees: FeeSchedule,
}

impl<U: UnitOfWork> WalletManager<U> {
    pub fn new(uow: Arc<U>, ledger: &LedgerSettings) -> Self {
        Self {
            uow,
            fees: FeeSchedule::from(ledger),
        }
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl<U: UnitOfWork> WalletService for WalletManager<U> {
    async fn wallet(&self, user_id: Uuid) -> AppResult<WalletSummary> {
        let investments = self.uow.investments();
        let (user, (active_investments, total_earned_nsl)) =
            parallel::join2(self.load(user_id), investments.earnings(user_id)).await?;

        Ok(WalletSummary {
            balance_nsl: user.balance_nsl,
            balance_usdt: user.balance_usdt,
            vip_level: user.vip_level,
            active_investments,
            total_earned_nsl,
        })
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
        status: Option<TransactionStatus>,
        params: PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)> {
        let filter = TransactionFilter {
            user_id: Some(user_id),
            kind,
            status,
        };
        self.uow.transactions().list(&filter, &params).await
    }

    async fn request_deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: String,
    ) -> AppResult<Transaction> {
        let reference = reference.trim().to_string();
        if reference.is_empty() || reference.len() > MAX_REFERENCE_LENGTH {
            return Err(AppError::validation("Deposit reference is invalid"));
        }
        let quote = self.fees.quote_deposit(amount)?;
        self.load(user_id).await?;

        if self
            .uow
            .transactions()
            .deposit_reference_in_use(&reference)
            .await?
        {
            return Err(AppError::conflict("Deposit reference"));
        }

        let tx = self
            .uow
            .transactions()
            .create(NewTransaction::deposit(user_id, quote, reference))
            .await
            .map_err(|e| e.unique_as_conflict("Deposit reference"))?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %tx.id,
            amount = %tx.amount,
            "Deposit requested"
        );
        Ok(tx)
    }

    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        totp_code: Option<String>,
    ) -> AppResult<Transaction> {
        let user = self.load(user_id).await?;
        user.ensure_kyc_approved()?;
        let (network, address) = user.verified_address()?;
        check_totp(self.uow.users().as_ref(), &user, totp_code.as_deref()).await?;
        let quote = self.fees.quote_withdrawal(amount)?;

        let tx = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut user = ctx.users().lock(user_id).await?;
                    let mut wallet = user.wallet();
                    wallet.debit(Currency::Usdt, quote.amount)?;
                    user.set_wallet(wallet);
                    ctx.users().save_balances(&user).await?;

                    ctx.transactions()
                        .create(NewTransaction::withdrawal(user_id, quote, network, address))
                        .await
                })
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %tx.id,
            amount = %tx.amount,
            fee = %tx.fee,
            "Withdrawal requested, funds held"
        );
        Ok(tx)
    }

    async fn convert(
        &self,
        user_id: Uuid,
        from: Currency,
        amount: Decimal,
    ) -> AppResult<Transaction> {
        let rate = self
            .uow
            .rates()
            .current()
            .await?
            .ok_or_else(|| AppError::invalid_state("Exchange rate has not been set"))?;
        let received = rate.convert(from, amount)?;
        let to = from.counterpart();
        let note = format!("1 NSL = {} USDT", rate.rate.normalize());

        let tx = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut user = ctx.users().lock(user_id).await?;
                    let mut wallet = user.wallet();
                    wallet.debit(from, amount)?;
                    wallet.credit(to, received)?;
                    user.set_wallet(wallet);
                    ctx.users().save_balances(&user).await?;

                    ctx.transactions()
                        .create(NewTransaction::conversion(user_id, from, amount, received).with_note(note))
                        .await
                })
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %tx.id,
            from = %from,
            amount = %amount,
            received = %received,
            "Currency converted"
        );
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::fixtures;
    use crate::domain::{AddressStatus, ExchangeRate, KycStatus, Network, TotpSecret};
    use crate::services::test_support::TestUnitOfWork;
    use chrono::Utc;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn withdrawable_user() -> User {
        let mut user = fixtures::user();
        user.balance_usdt = dec("100");
        user.kyc_status = KycStatus::Approved;
        user.address_status = AddressStatus::Verified;
        user.withdrawal_network = Some(Network::Trc20);
        user.withdrawal_address = Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".into());
        user
    }

    fn manager(uow: TestUnitOfWork) -> WalletManager<crate::services::test_support::BuiltUnitOfWork> {
        WalletManager::new(uow.build(), &LedgerSettings::default())
    }

    fn with_user(user: User) -> TestUnitOfWork {
        let mut uow = TestUnitOfWork::new();
        uow.users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        uow
    }

    #[tokio::test]
    async fn test_wallet_summary() {
        let mut user = fixtures::user();
        user.balance_nsl = dec("150.25");
        user.vip_level = 2;

        let mut uow = with_user(user);
        uow.investments
            .expect_earnings()
            .returning(|_| Ok((3, dec("12.5"))));

        let summary = manager(uow).wallet(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.balance_nsl, dec("150.25"));
        assert_eq!(summary.vip_level, 2);
        assert_eq!(summary.active_investments, 3);
        assert_eq!(summary.total_earned_nsl, dec("12.5"));
    }

    #[tokio::test]
    async fn test_transactions_are_scoped_to_user() {
        let user_id = Uuid::new_v4();
        let mut uow = TestUnitOfWork::new();
        uow.transactions
            .expect_list()
            .withf(move |filter, _| {
                filter.user_id == Some(user_id) && filter.kind == Some(TransactionKind::Deposit)
            })
            .returning(|_, _| Ok((vec![], 0)));

        let (items, total) = manager(uow)
            .transactions(
                user_id,
                Some(TransactionKind::Deposit),
                None,
                PaginationParams::default(),
            )
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_deposit_request_is_pending_with_fee() {
        let mut uow = with_user(fixtures::user());
        uow.transactions
            .expect_deposit_reference_in_use()
            .returning(|_| Ok(false));
        uow.transactions
            .expect_create()
            .withf(|tx| {
                tx.kind == TransactionKind::Deposit
                    && tx.status == TransactionStatus::Pending
                    && tx.reference.as_deref() == Some("0xabc")
            })
            .times(1)
            .returning(|new| {
                let now = Utc::now();
                Ok(Transaction {
                    id: Uuid::new_v4(),
                    user_id: new.user_id,
                    kind: new.kind,
                    currency: new.currency,
                    amount: new.amount,
                    fee: new.fee,
                    net_amount: new.net_amount,
                    status: new.status,
                    reference: new.reference,
                    address: None,
                    network: None,
                    external_id: None,
                    counter_currency: None,
                    counter_amount: None,
                    related_id: None,
                    note: None,
                    reviewed_by: None,
                    reviewed_at: None,
                    created_at: now,
                    updated_at: now,
                })
            });

        let tx = manager(uow)
            .request_deposit(Uuid::new_v4(), dec("50"), " 0xabc ".into())
            .await
            .unwrap();
        assert_eq!(tx.currency, Currency::Usdt);
        assert_eq!(tx.net_amount, dec("50"));
    }

    #[tokio::test]
    async fn test_deposit_reference_reuse_is_conflict() {
        let mut uow = with_user(fixtures::user());
        uow.transactions
            .expect_deposit_reference_in_use()
            .returning(|_| Ok(true));
        uow.transactions.expect_create().never();

        let err = manager(uow)
            .request_deposit(Uuid::new_v4(), dec("50"), "0xabc".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deposit_below_minimum() {
        let uow = TestUnitOfWork::new();
        let err = manager(uow)
            .request_deposit(Uuid::new_v4(), dec("5"), "0xabc".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_withdrawal_requires_kyc() {
        let mut user = withdrawable_user();
        user.kyc_status = KycStatus::Pending;

        let err = manager(with_user(user))
            .request_withdrawal(Uuid::new_v4(), dec("20"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_withdrawal_requires_verified_address() {
        let mut user = withdrawable_user();
        user.address_status = AddressStatus::Pending;

        let err = manager(with_user(user))
            .request_withdrawal(Uuid::new_v4(), dec("20"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_withdrawal_requires_two_factor_code_when_enabled() {
        let mut user = withdrawable_user();
        user.two_factor_enabled = true;
        user.two_factor_secret = Some(TotpSecret::generate().to_base32());

        let err = manager(with_user(user))
            .request_withdrawal(Uuid::new_v4(), dec("20"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TwoFactorRequired));
    }

    #[tokio::test]
    async fn test_withdrawal_below_minimum() {
        let err = manager(with_user(withdrawable_user()))
            .request_withdrawal(Uuid::new_v4(), dec("9.99"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_withdrawal_holds_gross_amount() {
        let user = withdrawable_user();
        let user_id = user.id;
        let uow = with_user(user.clone());
        uow.ledger.seed_user(user);
        let uow = uow.build();
        let service = WalletManager::new(uow.clone(), &LedgerSettings::default());

        let tx = service
            .request_withdrawal(user_id, dec("20"), None)
            .await
            .unwrap();

        assert_eq!(tx.kind, TransactionKind::Withdrawal);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount, dec("20"));
        assert_eq!(tx.net_amount, tx.amount - tx.fee);
        assert_eq!(tx.address.as_deref(), Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE"));
        assert_eq!(uow.ledger().user(user_id).balance_usdt, dec("80"));
        assert_eq!(uow.ledger().transactions_of(user_id).len(), 1);
    }

    #[tokio::test]
    async fn test_withdrawal_over_balance_leaves_ledger_untouched() {
        let user = withdrawable_user();
        let user_id = user.id;
        let uow = with_user(user.clone());
        uow.ledger.seed_user(user);
        let uow = uow.build();
        let service = WalletManager::new(uow.clone(), &LedgerSettings::default());

        let err = service
            .request_withdrawal(user_id, dec("100.01"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(uow.ledger().user(user_id).balance_usdt, dec("100"));
        assert!(uow.ledger().transactions_of(user_id).is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_checks_balance_on_locked_row() {
        let user = withdrawable_user();
        let user_id = user.id;
        let uow = with_user(user.clone());
        let mut drained = user;
        drained.balance_usdt = dec("15");
        uow.ledger.seed_user(drained);
        let uow = uow.build();
        let service = WalletManager::new(uow.clone(), &LedgerSettings::default());

        let err = service
            .request_withdrawal(user_id, dec("20"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(uow.ledger().user(user_id).balance_usdt, dec("15"));
    }

    #[tokio::test]
    async fn test_convert_moves_both_balances() {
        let mut user = fixtures::user();
        user.balance_nsl = dec("100");
        let user_id = user.id;

        let mut uow = TestUnitOfWork::new();
        uow.rates.expect_current().returning(|| {
            Ok(Some(ExchangeRate {
                id: Uuid::new_v4(),
                base: "NSL".into(),
                quote: "USDT".into(),
                rate: dec("0.25"),
                set_by: None,
                created_at: Utc::now(),
            }))
        });
        uow.ledger.seed_user(user);
        let uow = uow.build();
        let service = WalletManager::new(uow.clone(), &LedgerSettings::default());

        let tx = service
            .convert(user_id, Currency::Nsl, dec("40"))
            .await
            .unwrap();

        assert_eq!(tx.kind, TransactionKind::Conversion);
        assert_eq!(tx.counter_amount, Some(dec("10")));
        let stored = uow.ledger().user(user_id);
        assert_eq!(stored.balance_nsl, dec("60"));
        assert_eq!(stored.balance_usdt, dec("10"));
    }

    #[tokio::test]
    async fn test_convert_without_rate() {
        let mut uow = TestUnitOfWork::new();
        uow.rates.expect_current().returning(|| Ok(None));

        let err = manager(uow)
            .convert(Uuid::new_v4(), Currency::Nsl, dec("10"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_convert_dust_is_rejected_before_touching_balances() {
        let mut uow = TestUnitOfWork::new();
        uow.rates.expect_current().returning(|| {
            Ok(Some(ExchangeRate {
                id: Uuid::new_v4(),
                base: "NSL".into(),
                quote: "USDT".into(),
                rate: dec("0.00000001"),
                set_by: None,
                created_at: Utc::now(),
            }))
        });

        let err = manager(uow)
            .convert(Uuid::new_v4(), Currency::Nsl, dec("0.5"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
