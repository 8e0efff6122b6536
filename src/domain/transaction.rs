//! Ledger transactions, their review state machine, and fee quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::address::Network;
use super::money::{ensure_positive, percent_of, round_money, Currency};
use crate::config::LedgerSettings;
use crate::errors::{AppError, AppResult};

/// What moved the money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Purchase,
    DailyIncome,
    ReferralBonus,
    Conversion,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Purchase => "purchase",
            TransactionKind::DailyIncome => "daily_income",
            TransactionKind::ReferralBonus => "referral_bonus",
            TransactionKind::Conversion => "conversion",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    /// Deposits and withdrawals wait for an admin; everything else settles at once.
    pub fn requires_review(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::Withdrawal)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            "purchase" => Some(TransactionKind::Purchase),
            "daily_income" => Some(TransactionKind::DailyIncome),
            "referral_bonus" => Some(TransactionKind::ReferralBonus),
            "conversion" => Some(TransactionKind::Conversion),
            "adjustment" => Some(TransactionKind::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "approved" => Some(TransactionStatus::Approved),
            "rejected" => Some(TransactionStatus::Rejected),
            "completed" => Some(TransactionStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub currency: Currency,
    /// Gross amount moved
    #[schema(value_type = String, example = "100.00000000")]
    pub amount: Decimal,
    #[schema(value_type = String, example = "5.00000000")]
    pub fee: Decimal,
    /// Amount after fees
    #[schema(value_type = String, example = "95.00000000")]
    pub net_amount: Decimal,
    pub status: TransactionStatus,
    /// Exchange transaction id claimed for a deposit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Exchange withdrawal id once submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub counter_amount: Option<Decimal>,
    /// Investment or referred user this entry relates to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn ensure_reviewable(&self) -> AppResult<()> {
        if !self.kind.requires_review() {
            return Err(AppError::invalid_state(format!(
                "{} transactions are not reviewed",
                self.kind
            )));
        }
        if !self.is_pending() {
            return Err(AppError::invalid_state(format!(
                "Transaction is already {}",
                self.status
            )));
        }
        Ok(())
    }

    pub fn approve(&mut self, admin_id: Uuid, note: Option<String>) -> AppResult<()> {
        self.review(TransactionStatus::Approved, admin_id, note)
    }

    pub fn reject(&mut self, admin_id: Uuid, reason: String) -> AppResult<()> {
        self.review(TransactionStatus::Rejected, admin_id, Some(reason))
    }

    fn review(
        &mut self,
        status: TransactionStatus,
        admin_id: Uuid,
        note: Option<String>,
    ) -> AppResult<()> {
        self.ensure_reviewable()?;
        let now = Utc::now();
        self.status = status;
        self.reviewed_by = Some(admin_id);
        self.reviewed_at = Some(now);
        if note.is_some() {
            self.note = note;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Amount to return to the user when a held withdrawal is rejected.
    pub fn refund_amount(&self) -> Option<Decimal> {
        (self.kind == TransactionKind::Withdrawal && self.status == TransactionStatus::Rejected)
            .then_some(self.amount)
    }
}

/// Data for a ledger entry about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub currency: Currency,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub address: Option<String>,
    pub network: Option<Network>,
    pub counter_currency: Option<Currency>,
    pub counter_amount: Option<Decimal>,
    pub related_id: Option<Uuid>,
    pub note: Option<String>,
    pub reviewed_by: Option<Uuid>,
}

impl NewTransaction {
    /// A fee-less entry; reviewed kinds start pending, the rest completed.
    pub fn new(user_id: Uuid, kind: TransactionKind, currency: Currency, amount: Decimal) -> Self {
        let status = if kind.requires_review() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Completed
        };
        Self {
            user_id,
            kind,
            currency,
            amount,
            fee: Decimal::ZERO,
            net_amount: amount,
            status,
            reference: None,
            address: None,
            network: None,
            counter_currency: None,
            counter_amount: None,
            related_id: None,
            note: None,
            reviewed_by: None,
        }
    }

    pub fn deposit(user_id: Uuid, quote: Quote, reference: String) -> Self {
        Self {
            reference: Some(reference),
            ..Self::new(user_id, TransactionKind::Deposit, Currency::Usdt, quote.amount)
                .with_fee(quote)
        }
    }

    pub fn withdrawal(user_id: Uuid, quote: Quote, network: Network, address: String) -> Self {
        Self {
            address: Some(address),
            network: Some(network),
            ..Self::new(user_id, TransactionKind::Withdrawal, Currency::Usdt, quote.amount)
                .with_fee(quote)
        }
    }

    pub fn conversion(user_id: Uuid, from: Currency, amount: Decimal, received: Decimal) -> Self {
        Self {
            counter_currency: Some(from.counterpart()),
            counter_amount: Some(received),
            ..Self::new(user_id, TransactionKind::Conversion, from, amount)
        }
    }

    /// Manual balance correction; `net_amount` carries the signed change.
    pub fn adjustment(
        user_id: Uuid,
        currency: Currency,
        delta: Decimal,
        admin_id: Uuid,
        note: String,
    ) -> Self {
        Self {
            net_amount: delta,
            note: Some(note),
            reviewed_by: Some(admin_id),
            ..Self::new(user_id, TransactionKind::Adjustment, currency, delta.abs())
        }
    }

    fn with_fee(mut self, quote: Quote) -> Self {
        self.fee = quote.fee;
        self.net_amount = quote.net_amount;
        self
    }

    pub fn related_to(mut self, id: Uuid) -> Self {
        self.related_id = Some(id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn reviewed_by(mut self, admin_id: Uuid) -> Self {
        self.reviewed_by = Some(admin_id);
        self
    }
}

/// Fee breakdown for a requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Quote {
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub fee: Decimal,
    #[schema(value_type = String)]
    pub net_amount: Decimal,
}

/// Fees and limits applied to deposits and withdrawals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    withdrawal_fee_percent: Decimal,
    withdrawal_min_fee: Decimal,
    min_withdrawal: Decimal,
    min_deposit: Decimal,
    deposit_fee_percent: Decimal,
}

impl From<&LedgerSettings> for FeeSchedule {
    fn from(settings: &LedgerSettings) -> Self {
        Self {
            withdrawal_fee_percent: settings.withdrawal_fee_percent,
            withdrawal_min_fee: settings.withdrawal_min_fee,
            min_withdrawal: settings.min_withdrawal,
            min_deposit: settings.min_deposit,
            deposit_fee_percent: settings.deposit_fee_percent,
        }
    }
}

impl FeeSchedule {
    /// `max(amount * pct / 100, min_fee)`
    pub fn withdrawal_fee(&self, amount: Decimal) -> Decimal {
        percent_of(amount, self.withdrawal_fee_percent).max(round_money(self.withdrawal_min_fee))
    }

    pub fn deposit_fee(&self, amount: Decimal) -> Decimal {
        percent_of(amount, self.deposit_fee_percent)
    }

    pub fn quote_withdrawal(&self, amount: Decimal) -> AppResult<Quote> {
        ensure_positive(amount, "Withdrawal amount")?;
        if amount < self.min_withdrawal {
            return Err(AppError::validation(format!(
                "Minimum withdrawal is {} USDT",
                self.min_withdrawal
            )));
        }
        let fee = self.withdrawal_fee(amount);
        if fee >= amount {
            return Err(AppError::validation("Withdrawal amount does not cover the fee"));
        }
        Ok(Quote {
            amount,
            fee,
            net_amount: amount - fee,
        })
    }

    pub fn quote_deposit(&self, amount: Decimal) -> AppResult<Quote> {
        ensure_positive(amount, "Deposit amount")?;
        if amount < self.min_deposit {
            return Err(AppError::validation(format!(
                "Minimum deposit is {} USDT",
                self.min_deposit
            )));
        }
        let fee = self.deposit_fee(amount);
        if fee >= amount {
            return Err(AppError::validation("Deposit amount does not cover the fee"));
        }
        Ok(Quote {
            amount,
            fee,
            net_amount: amount - fee,
        })
    }
}

/// Filters for transaction listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn schedule() -> FeeSchedule {
        FeeSchedule::from(&LedgerSettings::default())
    }

    fn pending_withdrawal() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: TransactionKind::Withdrawal,
            currency: Currency::Usdt,
            amount: dec("100"),
            fee: dec("5"),
            net_amount: dec("95"),
            status: TransactionStatus::Pending,
            reference: None,
            address: Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".to_string()),
            network: Some(Network::Trc20),
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

    #[test]
    fn test_withdrawal_fee_uses_percent_above_minimum() {
        assert_eq!(schedule().withdrawal_fee(dec("100")), dec("5"));
        assert_eq!(schedule().withdrawal_fee(dec("10")), dec("1"));
        assert_eq!(schedule().withdrawal_fee(dec("33.33333333")), dec("1.66666666"));
    }

    #[test]
    fn test_quote_withdrawal() {
        let quote = schedule().quote_withdrawal(dec("100")).unwrap();
        assert_eq!(quote.fee, dec("5"));
        assert_eq!(quote.net_amount, dec("95"));
        assert_eq!(quote.amount, quote.fee + quote.net_amount);
    }

    #[test]
    fn test_quote_withdrawal_below_minimum() {
        assert!(matches!(
            schedule().quote_withdrawal(dec("9.99")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_quote_withdrawal_fee_cannot_consume_amount() {
        let settings = LedgerSettings {
            min_withdrawal: dec("0.5"),
            ..LedgerSettings::default()
        };
        let schedule = FeeSchedule::from(&settings);
        assert!(schedule.quote_withdrawal(dec("1")).is_err());
        assert!(schedule.quote_withdrawal(dec("1.5")).is_ok());
    }

    #[test]
    fn test_quote_deposit_without_fee() {
        let quote = schedule().quote_deposit(dec("25")).unwrap();
        assert_eq!(quote.fee, Decimal::ZERO);
        assert_eq!(quote.net_amount, dec("25"));
        assert!(schedule().quote_deposit(dec("5")).is_err());
    }

    #[test]
    fn test_new_transaction_status_follows_kind() {
        let user = Uuid::new_v4();
        let quote = schedule().quote_deposit(dec("10")).unwrap();
        assert_eq!(
            NewTransaction::deposit(user, quote, "tx".into()).status,
            TransactionStatus::Pending
        );
        assert_eq!(
            NewTransaction::new(user, TransactionKind::Purchase, Currency::Nsl, dec("1")).status,
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_conversion_records_counter_side() {
        let tx = NewTransaction::conversion(Uuid::new_v4(), Currency::Nsl, dec("10"), dec("2.5"));
        assert_eq!(tx.currency, Currency::Nsl);
        assert_eq!(tx.counter_currency, Some(Currency::Usdt));
        assert_eq!(tx.counter_amount, Some(dec("2.5")));
    }

    #[test]
    fn test_adjustment_keeps_sign_in_net_amount() {
        let admin = Uuid::new_v4();
        let tx = NewTransaction::adjustment(
            Uuid::new_v4(),
            Currency::Nsl,
            dec("-12.5"),
            admin,
            "correction".into(),
        );
        assert_eq!(tx.amount, dec("12.5"));
        assert_eq!(tx.net_amount, dec("-12.5"));
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.reviewed_by, Some(admin));
    }

    #[test]
    fn test_approve_pending() {
        let admin = Uuid::new_v4();
        let mut tx = pending_withdrawal();
        tx.approve(admin, Some("paid".into())).unwrap();

        assert_eq!(tx.status, TransactionStatus::Approved);
        assert_eq!(tx.reviewed_by, Some(admin));
        assert!(tx.reviewed_at.is_some());
        assert_eq!(tx.refund_amount(), None);
    }

    #[test]
    fn test_second_review_is_invalid_state() {
        let mut tx = pending_withdrawal();
        tx.approve(Uuid::new_v4(), None).unwrap();

        let err = tx.reject(Uuid::new_v4(), "late".into()).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(tx.status, TransactionStatus::Approved);
    }

    #[test]
    fn test_rejected_withdrawal_refunds_gross_amount() {
        let mut tx = pending_withdrawal();
        tx.reject(Uuid::new_v4(), "address mismatch".into()).unwrap();

        assert_eq!(tx.refund_amount(), Some(dec("100")));
        assert_eq!(tx.note.as_deref(), Some("address mismatch"));
    }

    #[test]
    fn test_instant_kinds_are_not_reviewable() {
        let mut tx = pending_withdrawal();
        tx.kind = TransactionKind::Purchase;
        assert!(tx.ensure_reviewable().is_err());
    }

    #[test]
    fn test_kind_names_parse_back() {
        assert_eq!(TransactionKind::parse("daily_income"), Some(TransactionKind::DailyIncome));
        assert_eq!(TransactionStatus::parse("completed"), Some(TransactionStatus::Completed));
        assert_eq!(TransactionKind::parse("refund"), None);
    }
}
