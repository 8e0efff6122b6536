//! Background jobs processed by the apalis worker.

mod payout_job;

pub use payout_job::{payout_job_handler, PayoutJob};
