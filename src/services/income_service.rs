//! Daily income distribution.
//!
//! Each due investment is paid in its own database transaction with the
//! investment row locked, so overlapping runs never pay a day twice and one
//! failing investment does not block the rest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::container::parallel;
use crate::config::PAYOUT_CONCURRENCY;
use crate::domain::{Currency, NewTransaction, PayoutSummary, TransactionKind};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait IncomeService: Send + Sync {
    /// Pay every active investment whose next payout is at or before `now`
    async fn distribute_due(&self, now: DateTime<Utc>) -> AppResult<PayoutSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Payout {
    Paid {
        payouts: i32,
        amount: Decimal,
        completed: bool,
    },
    Skipped,
    Failed,
}

pub struct IncomeManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> IncomeManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    async fn pay_one(&self, investment_id: Uuid, now: DateTime<Utc>) -> AppResult<Payout> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let mut investment = ctx.investments().lock(investment_id).await?;
                    let due = investment.due_payouts(now);
                    if due == 0 {
                        return Ok(Payout::Skipped);
                    }

                    let Some(mut user) = ctx.users().lock_if_active(investment.user_id).await?
                    else {
                        tracing::debug!(investment_id = %investment_id, "Owner deleted, payout skipped");
                        return Ok(Payout::Skipped);
                    };

                    let amount = investment.record_payouts(due, now);
                    let mut wallet = user.wallet();
                    wallet.credit(Currency::Nsl, amount)?;
                    user.set_wallet(wallet);
                    ctx.users().save_balances(&user).await?;

                    ctx.transactions()
                        .create(
                            NewTransaction::new(
                                investment.user_id,
                                TransactionKind::DailyIncome,
                                Currency::Nsl,
                                amount,
                            )
                            .related_to(investment.id)
                            .with_note(format!(
                                "VIP {} income, {} day(s)",
                                investment.vip_level, due
                            )),
                        )
                        .await?;
                    ctx.investments().save_progress(&investment).await?;

                    Ok(Payout::Paid {
                        payouts: due,
                        amount,
                        completed: !investment.is_active(),
                    })
                })
            })
            .await
    }
}

#[async_trait]
impl<U: UnitOfWork> IncomeService for IncomeManager<U> {
    async fn distribute_due(&self, now: DateTime<Utc>) -> AppResult<PayoutSummary> {
        let due = self.uow.investments().due_ids(now).await?;
        if due.is_empty() {
            tracing::debug!("No investments due");
            return Ok(PayoutSummary::default());
        }

        let outcomes = parallel::join_all_limited(
            due.into_iter().map(|id| async move {
                Ok::<_, AppError>(match self.pay_one(id, now).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(investment_id = %id, error = %e, "Payout failed");
                        Payout::Failed
                    }
                })
            }),
            PAYOUT_CONCURRENCY,
        )
        .await?;

        let mut summary = PayoutSummary::default();
        for outcome in outcomes {
            match outcome {
                Payout::Paid {
                    payouts,
                    amount,
                    completed,
                } => summary.record(payouts, amount, completed),
                Payout::Skipped => {}
                Payout::Failed => summary.failures += 1,
            }
        }

        tracing::info!(
            investments_paid = summary.investments_paid,
            payouts = summary.payouts,
            completed = summary.investments_completed,
            failures = summary.failures,
            total_nsl = %summary.total_nsl,
            "Income distributed"
        );
        Ok(summary)
    }
}
