//! `schedule` command: the daily run on a cron expression.
//!
//! The job runs in UTC. A tick that fires while the previous run is still
//! going is skipped.

use std::sync::Arc;

use rivalwatch_core::{AppConfig, RunContext};
use rivalwatch_scraper::PageFetcher;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::run::{self, Collector, TaskKind};

/// Registers the daily job and blocks until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the fetcher cannot be built, the cron expression is
/// invalid, or the scheduler fails to start or stop.
pub(crate) async fn run_scheduled(pool: SqlitePool, config: AppConfig) -> anyhow::Result<()> {
    let fetcher = Arc::new(PageFetcher::from_app_config(&config)?);
    let config = Arc::new(config);
    let pool = Arc::new(pool);
    let in_flight = Arc::new(Mutex::new(()));

    let mut scheduler = JobScheduler::new().await?;
    let cron = config.schedule_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let fetcher = Arc::clone(&fetcher);
        let in_flight = Arc::clone(&in_flight);

        Box::pin(async move {
            let Ok(_guard) = in_flight.try_lock() else {
                tracing::warn!("scheduler: previous run still in progress; skipping tick");
                return;
            };
            tracing::info!("scheduler: starting daily run");
            run_scheduled_once(&pool, &config, &fetcher).await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron = %cron, "scheduler started; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

async fn run_scheduled_once(pool: &SqlitePool, config: &AppConfig, fetcher: &PageFetcher) {
    let collector = Collector {
        pool,
        fetcher,
        trustpilot_base_url: &config.trustpilot_base_url,
        google_search_url: &config.google_search_url,
        ctx: RunContext::now(),
    };

    match run::run_daily(&collector, &TaskKind::ALL, "schedule").await {
        Ok(report) => {
            for line in run::format_summary(&report.results).lines() {
                tracing::info!("{line}");
            }
            if !report.succeeded {
                tracing::error!(run_id = report.run_id, "scheduler: every task failed");
            }
        }
        Err(e) => tracing::error!(error = %format!("{e:#}"), "scheduler: daily run aborted"),
    }
}
