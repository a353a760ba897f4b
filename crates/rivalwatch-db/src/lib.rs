use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/rivalwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Tables whose row counts the run ledger may sample.
pub const SIGNAL_TABLES: &[&str] = &[
    "prices_v2",
    "products_v2",
    "snapshots",
    "diffs",
    "reviews_trustpilot",
    "reviews_google",
    "ab_tests",
];

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &rivalwatch_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("scrape run {id} is not in expected status '{expected_status}'")]
    InvalidRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("table '{0}' is not a tracked signal table")]
    UnknownTable(String),
    #[error("failed to encode column value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Outcome of [`run_migrations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Versioned migrations applied by this call.
    pub applied: usize,
    /// `table.column` entries added to pre-existing tables.
    pub repaired_columns: Vec<String>,
}

/// Open a SQLite pool, creating the database file if it does not exist.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the URL is malformed or the connection cannot be
/// established.
pub async fn connect_pool(
    database_url: &str,
    config: PoolConfig,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
}

/// Open a single-connection in-memory database.
///
/// Each SQLite in-memory connection owns a private database, so the pool is
/// pinned to one connection that never expires.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Run all pending migrations, then add any columns missing from tables that
/// predate them.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if a migration fails or [`DbError::Sqlx`] if
/// the column repair fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<MigrationSummary, DbError> {
    // The _sqlx_migrations table does not exist yet on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let repaired_columns = schema::repair_legacy_columns(pool).await?;

    let delta = (applied_after - applied_before).max(0);
    Ok(MigrationSummary {
        applied: usize::try_from(delta).unwrap_or(0),
        repaired_columns,
    })
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Number of rows currently in one of [`SIGNAL_TABLES`].
///
/// # Errors
///
/// Returns [`DbError::UnknownTable`] for names outside [`SIGNAL_TABLES`], or
/// [`DbError::Sqlx`] if the query fails.
pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64, DbError> {
    let Some(table) = SIGNAL_TABLES.iter().find(|t| **t == table) else {
        return Err(DbError::UnknownTable(table.to_string()));
    };

    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}


pub mod competitors;
pub mod prices;
pub mod products;
pub mod reports;
pub mod reviews;
pub mod schema;
pub mod scrape_runs;
pub mod snapshots;

pub use ab_tests::{insert_ab_test_detections, list_ab_tests, AbTestRow};
pub use competitors::{
    get_competitor_by_domain, list_competitors, seed_competitors, CompetitorRow,
};
pub use prices::{get_price, upsert_price, PriceRow};
pub use products::{get_product, upsert_product, ProductRow};
pub use reports::{
    latest_google_reviews, latest_trustpilot_reviews, list_ab_test_report, list_diff_report,
    list_google_review_report, list_price_report, list_product_report,
    list_trustpilot_review_report, AbTestReportRow, DiffReportRow, GoogleReviewReportRow,
    PriceReportRow, ProductReportRow, ReportFilter, TrustpilotReviewReportRow,
};
pub use reviews::{
    insert_review, list_google_reviews, list_trustpilot_reviews, GoogleReviewRow,
    TrustpilotReviewRow,
};
pub use scrape_runs::{
    complete_scrape_run, create_scrape_run, fail_scrape_run, get_scrape_run,
    list_scrape_run_tasks, list_scrape_runs, record_task_result, start_scrape_run,
    ScrapeRunRow, ScrapeRunTaskRow, TaskResult, TaskStatus,
};
pub use snapshots::{
    get_previous_snapshot, insert_diff, insert_snapshot, list_diffs, DiffRow, NewDiff,
    NewSnapshot, SnapshotRow,
};
