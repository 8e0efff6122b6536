//! Jobs command - Payout worker and queue management.
//!
//! ```bash
//! # Worker with its own hourly payout timer
//! salon-money jobs work
//!
//! # Enqueue one payout run (cron)
//! salon-money jobs payout
//!
//! salon-money jobs list
//! salon-money jobs clear
//! ```

use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::*;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;
use apalis_sql::sqlx::PgPool;
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, JOB_NAME_PAYOUT, PAYOUT_SCHEDULE_SECONDS};
use crate::errors::{AppError, AppResult};
use crate::infra::Database;
use crate::jobs::{payout_job_handler, PayoutJob};
use crate::services::{IncomeService, ServiceContainer, Services};

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(config).await,
        JobsAction::Payout => enqueue_payout(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
    }
}

async fn job_storage(config: &Config) -> AppResult<PostgresStorage<PayoutJob>> {
    let pool: PgPool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    Ok(PostgresStorage::new(pool))
}

async fn push_payout(storage: &mut PostgresStorage<PayoutJob>, source: &str) -> AppResult<()> {
    storage
        .push(PayoutJob::new(source))
        .await
        .map_err(|e| AppError::internal(format!("Failed to enqueue payout job: {}", e)))?;
    Ok(())
}

/// Start the payout worker.
///
/// Besides draining the queue, the worker enqueues a payout run every
/// `PAYOUT_SCHEDULE_SECONDS` so no external cron is required.
async fn run_worker(config: Config) -> AppResult<()> {
    tracing::info!("Connecting to database for payout worker...");

    let db = Database::connect(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
    let storage = job_storage(&config).await?;

    let services = Services::from_connection(db.get_connection(), None, config, None);
    let income: Arc<dyn IncomeService> = services.income();

    let worker = WorkerBuilder::new(JOB_NAME_PAYOUT)
        .data(income)
        .backend(storage.clone())
        .build_fn(payout_job_handler);
    let monitor = Monitor::new().register(worker);

    let mut timer_storage = storage;
    let timer = async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PAYOUT_SCHEDULE_SECONDS));
        loop {
            interval.tick().await;
            match push_payout(&mut timer_storage, "timer").await {
                Ok(()) => tracing::debug!("Scheduled payout run enqueued"),
                Err(e) => tracing::error!(error = %e, "Scheduled payout enqueue failed"),
            }
        }
    };

    tracing::info!(
        every_seconds = PAYOUT_SCHEDULE_SECONDS,
        "Payout worker started. Press Ctrl+C to stop."
    );

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = timer => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Payout worker stopped.");
    Ok(())
}

/// Enqueue a single payout run
async fn enqueue_payout(config: &Config) -> AppResult<()> {
    let mut storage = job_storage(config).await?;
    push_payout(&mut storage, "cron").await?;
    tracing::info!("Payout run enqueued");
    println!("Payout run enqueued.");
    Ok(())
}

/// True once `jobs work` or `jobs payout` has created the apalis schema
async fn queue_initialized(db: &sea_orm::DatabaseConnection) -> AppResult<bool> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') as exists".to_string(),
        ))
        .await?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}

async fn list_jobs(config: &Config) -> AppResult<()> {
    let db = sea_orm::Database::connect(&config.database_url).await?;

    if !queue_initialized(&db).await? {
        println!("\n=== Job Queue Status ===");
        println!("Job queue not initialized.");
        println!("Run 'jobs work' or 'jobs payout' first to create the queue tables.");
        println!("========================\n");
        return Ok(());
    }

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT status::text as status, COUNT(*)::bigint as count FROM apalis.jobs GROUP BY status".to_string(),
        ))
        .await?;

    let mut pending = 0i64;
    let mut running = 0i64;
    let mut failed = 0i64;
    let mut done = 0i64;

    for row in rows {
        if let (Ok(status), Ok(count)) = (
            row.try_get::<String>("", "status"),
            row.try_get::<i64>("", "count"),
        ) {
            match status.as_str() {
                "Pending" => pending = count,
                "Running" => running = count,
                "Failed" => failed = count,
                "Done" => done = count,
                _ => {}
            }
        }
    }

    println!("\n=== Job Queue Status ===");
    println!("Pending:  {}", pending);
    println!("Running:  {}", running);
    println!("Failed:   {}", failed);
    println!("Done:     {}", done);
    println!("========================\n");

    Ok(())
}

async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let db = sea_orm::Database::connect(&config.database_url).await?;

    if !queue_initialized(&db).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = db
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status = 'Failed'".to_string(),
        ))
        .await?;

    println!("Cleared {} failed job(s) from the queue.", result.rows_affected());
    Ok(())
}
