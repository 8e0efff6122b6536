//! Purchased VIP products and their income schedule.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::round_money;
use super::product::Product;
use crate::config::PAYOUT_INTERVAL_SECONDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Active,
    Completed,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Active => "active",
            InvestmentStatus::Completed => "completed",
        }
    }
}

impl From<&str> for InvestmentStatus {
    fn from(s: &str) -> Self {
        match s {
            "completed" => InvestmentStatus::Completed,
            _ => InvestmentStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Investment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub vip_level: i32,
    #[schema(value_type = String)]
    pub principal_nsl: Decimal,
    #[schema(value_type = String)]
    pub daily_income_nsl: Decimal,
    pub duration_days: i32,
    pub payouts_made: i32,
    #[schema(value_type = String)]
    pub total_earned_nsl: Decimal,
    pub status: InvestmentStatus,
    pub started_at: DateTime<Utc>,
    pub next_payout_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn payout_interval() -> Duration {
    Duration::seconds(PAYOUT_INTERVAL_SECONDS)
}

impl Investment {
    /// Terms of a purchase made at `now`; the first payout is one interval later.
    pub fn start(user_id: Uuid, product: &Product, now: DateTime<Utc>) -> NewInvestment {
        NewInvestment {
            user_id,
            product_id: product.id,
            vip_level: product.vip_level,
            principal_nsl: product.price_nsl,
            daily_income_nsl: product.daily_income_nsl,
            duration_days: product.duration_days,
            started_at: now,
            next_payout_at: now + payout_interval(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InvestmentStatus::Active
    }

    pub fn remaining_payouts(&self) -> i32 {
        (self.duration_days - self.payouts_made).max(0)
    }

    /// Payouts owed at `now`, counting missed days, capped by what remains.
    pub fn due_payouts(&self, now: DateTime<Utc>) -> i32 {
        if !self.is_active() || now < self.next_payout_at {
            return 0;
        }
        let overdue = (now - self.next_payout_at).num_seconds() / PAYOUT_INTERVAL_SECONDS;
        let due = i32::try_from(overdue.saturating_add(1)).unwrap_or(i32::MAX);
        due.min(self.remaining_payouts())
    }

    /// Income for `payouts` days.
    pub fn income_for(&self, payouts: i32) -> Decimal {
        round_money(self.daily_income_nsl * Decimal::from(payouts))
    }

    /// Advance the schedule after paying `payouts` days; returns the amount paid.
    pub fn record_payouts(&mut self, payouts: i32, now: DateTime<Utc>) -> Decimal {
        let payouts = payouts.clamp(0, self.remaining_payouts());
        if payouts == 0 {
            return Decimal::ZERO;
        }
        let amount = self.income_for(payouts);
        self.payouts_made += payouts;
        self.total_earned_nsl += amount;
        self.next_payout_at += payout_interval() * payouts;
        if self.remaining_payouts() == 0 {
            self.status = InvestmentStatus::Completed;
            self.completed_at = Some(now);
        }
        amount
    }
}

/// Investment about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvestment {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub vip_level: i32,
    pub principal_nsl: Decimal,
    pub daily_income_nsl: Decimal,
    pub duration_days: i32,
    pub started_at: DateTime<Utc>,
    pub next_payout_at: DateTime<Utc>,
}

/// Outcome of one distribution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayoutSummary {
    pub investments_paid: u64,
    pub payouts: u64,
    pub investments_completed: u64,
    pub failures: u64,
    #[schema(value_type = String)]
    pub total_nsl: Decimal,
}

impl PayoutSummary {
    pub fn record(&mut self, payouts: i32, amount: Decimal, completed: bool) {
        if payouts == 0 {
            return;
        }
        self.investments_paid += 1;
        self.payouts += payouts as u64;
        self.total_nsl += amount;
        if completed {
            self.investments_completed += 1;
        }
    }
}
