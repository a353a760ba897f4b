//! Database operations for `scrape_runs` and `scrape_run_tasks`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scrape_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub run_date: NaiveDate,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rows_inserted: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `scrape_run_tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRunTaskRow {
    pub id: i64,
    pub scrape_run_id: i64,
    pub task_name: String,
    pub status: String,
    pub rows_inserted: i64,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Final state of one task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// At least one competitor produced data.
    Success,
    /// Completed without error but nothing was collected.
    NoData,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::NoData => "no_data",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_name: String,
    pub status: TaskStatus,
    pub rows_inserted: i64,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// scrape_runs operations
// ---------------------------------------------------------------------------

/// Creates a new run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scrape_run(
    pool: &SqlitePool,
    run_date: NaiveDate,
    trigger_source: &str,
) -> Result<ScrapeRunRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeRunRow>(
        "INSERT INTO scrape_runs (public_id, run_date, trigger_source, status, created_at) \
         VALUES (?, ?, ?, 'queued', ?) \
         RETURNING id, public_id, run_date, trigger_source, status, started_at, \
                   completed_at, rows_inserted, error_message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(run_date)
    .bind(trigger_source)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a queued run as `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not queued, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_scrape_run(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs SET status = 'running', started_at = ? \
         WHERE id = ? AND status = 'queued'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` with its total inserted row count.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_scrape_run(
    pool: &SqlitePool,
    id: i64,
    rows_inserted: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs SET status = 'succeeded', completed_at = ?, rows_inserted = ? \
         WHERE id = ? AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(rows_inserted)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a running run as `failed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_scrape_run(
    pool: &SqlitePool,
    id: i64,
    rows_inserted: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = 'failed', completed_at = ?, rows_inserted = ?, error_message = ? \
         WHERE id = ? AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(rows_inserted)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this id, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_scrape_run(pool: &SqlitePool, id: i64) -> Result<ScrapeRunRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeRunRow>(
        "SELECT id, public_id, run_date, trigger_source, status, started_at, completed_at, \
                rows_inserted, error_message, created_at \
         FROM scrape_runs \
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<ScrapeRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeRunRow>(
        "SELECT id, public_id, run_date, trigger_source, status, started_at, completed_at, \
                rows_inserted, error_message, created_at \
         FROM scrape_runs \
         ORDER BY id DESC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// scrape_run_tasks operations
// ---------------------------------------------------------------------------

/// Inserts or updates the result row for one task of a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_task_result(
    pool: &SqlitePool,
    run_id: i64,
    result: &TaskResult,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO scrape_run_tasks \
             (scrape_run_id, task_name, status, rows_inserted, duration_ms, error_message, \
              created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (scrape_run_id, task_name) DO UPDATE SET \
             status        = excluded.status, \
             rows_inserted = excluded.rows_inserted, \
             duration_ms   = excluded.duration_ms, \
             error_message = excluded.error_message",
    )
    .bind(run_id)
    .bind(&result.task_name)
    .bind(result.status.as_str())
    .bind(result.rows_inserted)
    .bind(result.duration_ms)
    .bind(&result.error_message)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Task rows for a run in the order they were recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_run_tasks(
    pool: &SqlitePool,
    run_id: i64,
) -> Result<Vec<ScrapeRunTaskRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeRunTaskRow>(
        "SELECT id, scrape_run_id, task_name, status, rows_inserted, duration_ms, \
                error_message, created_at \
         FROM scrape_run_tasks \
         WHERE scrape_run_id = ? \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
