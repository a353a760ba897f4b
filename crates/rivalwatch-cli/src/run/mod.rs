//! The daily scrape run.
//!
//! Tasks run one after another. Each task visits every competitor in turn and
//! commits that competitor's rows in its own transaction, so a failure part
//! way through keeps what earlier competitors produced. A failed task is
//! recorded and the run moves on to the next one.

mod tasks;

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::ValueEnum;
use rivalwatch_core::RunContext;
use rivalwatch_db::{CompetitorRow, TaskResult, TaskStatus};
use rivalwatch_scraper::PageFetcher;
use sqlx::SqlitePool;

/// Everything a task needs to scrape and store signals.
pub(crate) struct Collector<'a> {
    pub pool: &'a SqlitePool,
    pub fetcher: &'a PageFetcher,
    pub trustpilot_base_url: &'a str,
    pub google_search_url: &'a str,
    pub ctx: RunContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub(crate) enum TaskKind {
    Pricing,
    Products,
    Snapshots,
    ReviewsTrustpilot,
    ReviewsGoogle,
    AbTests,
}

impl TaskKind {
    pub(crate) const ALL: [TaskKind; 6] = [
        TaskKind::Pricing,
        TaskKind::Products,
        TaskKind::Snapshots,
        TaskKind::ReviewsTrustpilot,
        TaskKind::ReviewsGoogle,
        TaskKind::AbTests,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TaskKind::Pricing => "pricing",
            TaskKind::Products => "products",
            TaskKind::Snapshots => "snapshots",
            TaskKind::ReviewsTrustpilot => "reviews_trustpilot",
            TaskKind::ReviewsGoogle => "reviews_google",
            TaskKind::AbTests => "ab_tests",
        }
    }

    /// Tables whose growth is credited to this task.
    pub(crate) fn tables(self) -> &'static [&'static str] {
        match self {
            TaskKind::Pricing => &["prices_v2"],
            TaskKind::Products => &["products_v2"],
            TaskKind::Snapshots => &["snapshots", "diffs"],
            TaskKind::ReviewsTrustpilot => &["reviews_trustpilot"],
            TaskKind::ReviewsGoogle => &["reviews_google"],
            TaskKind::AbTests => &["ab_tests"],
        }
    }
}

/// Outcome of [`run_daily`].
#[derive(Debug)]
pub(crate) struct RunReport {
    pub run_id: i64,
    pub results: Vec<TaskResult>,
    /// `false` only when every task failed.
    pub succeeded: bool,
}

/// Runs `tasks` against every stored competitor and records the run ledger.
///
/// # Errors
///
/// Returns an error if the competitor list or the run ledger itself cannot be
/// read or written. Task failures are recorded, not returned.
pub(crate) async fn run_daily(
    collector: &Collector<'_>,
    tasks: &[TaskKind],
    trigger_source: &str,
) -> anyhow::Result<RunReport> {
    let pool = collector.pool;
    let competitors = rivalwatch_db::list_competitors(pool).await?;
    if competitors.is_empty() {
        tracing::warn!("no competitors stored; run `db seed` first");
    }

    let run =
        rivalwatch_db::create_scrape_run(pool, collector.ctx.scrape_date, trigger_source).await?;
    if let Err(e) = rivalwatch_db::start_scrape_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, 0, format!("{e:#}")).await;
        return Err(e.into());
    }
    tracing::info!(
        run_id = run.id,
        scrape_date = %collector.ctx.scrape_date,
        competitors = competitors.len(),
        tasks = tasks.len(),
        "scrape run started"
    );

    let mut results = Vec::with_capacity(tasks.len());
    for &task in tasks {
        let result = execute_task(collector, task, &competitors).await;
        tracing::info!(
            task = %result.task_name,
            status = %result.status,
            rows_inserted = result.rows_inserted,
            duration_ms = result.duration_ms,
            "task finished"
        );
        if let Err(e) = rivalwatch_db::record_task_result(pool, run.id, &result).await {
            tracing::error!(task = %result.task_name, error = %e, "failed to record task result");
        }
        results.push(result);
    }

    let rows_inserted: i64 = results.iter().map(|r| r.rows_inserted).sum();
    let succeeded = results.is_empty() || results.iter().any(|r| r.status != TaskStatus::Failed);

    if succeeded {
        rivalwatch_db::complete_scrape_run(pool, run.id, rows_inserted).await?;
    } else {
        let message = format!("all {} tasks failed", results.len());
        rivalwatch_db::fail_scrape_run(pool, run.id, rows_inserted, &message).await?;
    }
    tracing::info!(run_id = run.id, rows_inserted, succeeded, "scrape run finished");

    Ok(RunReport {
        run_id: run.id,
        results,
        succeeded,
    })
}

/// Runs one task over every competitor and measures its effect.
async fn execute_task(
    collector: &Collector<'_>,
    task: TaskKind,
    competitors: &[CompetitorRow],
) -> TaskResult {
    let started = Instant::now();
    let before = task_row_count(collector.pool, task).await;

    let outcome = collect_all(collector, task, competitors).await;

    let after = task_row_count(collector.pool, task).await;
    let rows_inserted = match (before, after) {
        (Ok(before), Ok(after)) => (after - before).max(0),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(task = task.as_str(), error = %e, "could not count task rows");
            0
        }
    };

    let (status, error_message) = match outcome {
        Ok(true) => (TaskStatus::Success, None),
        Ok(false) => (TaskStatus::NoData, None),
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(task = task.as_str(), error = %message, "task failed");
            (TaskStatus::Failed, Some(message))
        }
    };

    TaskResult {
        task_name: task.as_str().to_string(),
        status,
        rows_inserted,
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
        error_message,
    }
}

/// `true` when at least one competitor produced data.
async fn collect_all(
    collector: &Collector<'_>,
    task: TaskKind,
    competitors: &[CompetitorRow],
) -> anyhow::Result<bool> {
    let mut any_data = false;

    for competitor in competitors {
        let mut tx = collector.pool.begin().await?;
        let produced = tasks::collect_competitor(collector, &mut tx, task, competitor)
            .await
            .with_context(|| format!("{} for {}", task.as_str(), competitor.domain))?;
        tx.commit()
            .await
            .with_context(|| format!("committing {} for {}", task.as_str(), competitor.domain))?;

        if produced {
            any_data = true;
        } else {
            tracing::info!(
                task = task.as_str(),
                competitor = %competitor.domain,
                "no data collected"
            );
        }
    }

    Ok(any_data)
}

async fn task_row_count(pool: &SqlitePool, task: TaskKind) -> Result<i64, rivalwatch_db::DbError> {
    let mut total = 0;
    for table in task.tables() {
        total += rivalwatch_db::count_rows(pool, table).await?;
    }
    Ok(total)
}

async fn fail_run_best_effort(pool: &SqlitePool, run_id: i64, rows_inserted: i64, message: String) {
    if let Err(e) = rivalwatch_db::fail_scrape_run(pool, run_id, rows_inserted, &message).await {
        tracing::error!(run_id, error = %e, "failed to mark scrape run as failed");
    }
}

fn duration_of(result: &TaskResult) -> Duration {
    Duration::from_millis(u64::try_from(result.duration_ms).unwrap_or(0))
}

/// The end-of-run summary: a title line, then one CSV line per task.
pub(crate) fn format_summary(results: &[TaskResult]) -> String {
    let mut out = String::from("SCRAPER DAILY SUMMARY\nname,status,rows_inserted,duration_seconds\n");
    for result in results {
        let _ = writeln!(
            out,
            "{},{},{},{:.3}",
            result.task_name,
            result.status,
            result.rows_inserted,
            duration_of(result).as_secs_f64()
        );
    }
    out
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
