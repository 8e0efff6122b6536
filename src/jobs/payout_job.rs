//! Daily income payout job.
//!
//! Each job triggers one distribution run over every due investment. Runs
//! are idempotent, so duplicate or overlapping jobs pay nothing twice.

use std::sync::Arc;

use apalis::prelude::Data;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PayoutSummary;
use crate::errors::AppResult;
use crate::services::IncomeService;

/// Payout run request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutJob {
    pub requested_at: DateTime<Utc>,
    /// `timer` or `cron`
    pub source: String,
}

impl PayoutJob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            requested_at: Utc::now(),
            source: source.into(),
        }
    }
}

/// Runs income distribution for everything due now
pub async fn payout_job_handler(
    job: PayoutJob,
    income: Data<Arc<dyn IncomeService>>,
) -> AppResult<PayoutSummary> {
    tracing::info!(
        source = %job.source,
        requested_at = %job.requested_at,
        "Processing payout job"
    );

    let summary = income.distribute_due(Utc::now()).await?;

    tracing::info!(
        investments = summary.investments_paid,
        payouts = summary.payouts,
        completed = summary.investments_completed,
        failures = summary.failures,
        total_nsl = %summary.total_nsl,
        "Payout job finished"
    );
    Ok(summary)
}
