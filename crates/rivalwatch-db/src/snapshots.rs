//! Database operations for `snapshots` and `diffs`.

use chrono::{DateTime, NaiveDate, Utc};
use rivalwatch_core::{PageType, RunContext};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `snapshots` table. Ids order snapshots by recency within a
/// `(competitor_id, page_type)` pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub competitor_id: i64,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub page_type: String,
    pub page_url: String,
    pub html_content: String,
    /// Lowercase hex SHA-256 of `html_content`.
    pub content_hash: String,
}

/// A row from the `diffs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiffRow {
    pub id: i64,
    pub competitor_id: i64,
    pub diff_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub page_type: String,
    pub previous_snapshot_id: i64,
    pub current_snapshot_id: i64,
    pub diff_text: String,
    pub additions_count: i64,
    pub removals_count: i64,
}

pub struct NewSnapshot<'a> {
    pub competitor_id: i64,
    pub page_type: PageType,
    pub page_url: &'a str,
    pub html_content: &'a str,
    pub content_hash: &'a str,
}

pub struct NewDiff<'a> {
    pub competitor_id: i64,
    pub page_type: PageType,
    pub previous_snapshot_id: i64,
    pub current_snapshot_id: i64,
    pub diff_text: &'a str,
    pub additions_count: i64,
    pub removals_count: i64,
}

// ---------------------------------------------------------------------------
// snapshots operations
// ---------------------------------------------------------------------------

/// Append a snapshot and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_snapshot(
    conn: &mut SqliteConnection,
    ctx: &RunContext,
    snapshot: &NewSnapshot<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO snapshots \
             (competitor_id, scrape_date, scraped_at, page_type, page_url, html_content, \
              content_hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(snapshot.competitor_id)
    .bind(ctx.scrape_date)
    .bind(ctx.scraped_at)
    .bind(snapshot.page_type.as_str())
    .bind(snapshot.page_url)
    .bind(snapshot.html_content)
    .bind(snapshot.content_hash)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// The most recent snapshot of the same competitor and page type with an id
/// lower than `before_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_previous_snapshot(
    conn: &mut SqliteConnection,
    competitor_id: i64,
    page_type: PageType,
    before_id: i64,
) -> Result<Option<SnapshotRow>, DbError> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, competitor_id, scrape_date, scraped_at, page_type, page_url, \
                html_content, content_hash \
         FROM snapshots \
         WHERE competitor_id = ? AND page_type = ? AND id < ? \
         ORDER BY id DESC \
         LIMIT 1",
    )
    .bind(competitor_id)
    .bind(page_type.as_str())
    .bind(before_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// diffs operations
// ---------------------------------------------------------------------------

/// Append a diff row and return its id. `diff_date` and `created_at` come
/// from the run context.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_diff(
    conn: &mut SqliteConnection,
    ctx: &RunContext,
    diff: &NewDiff<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO diffs \
             (competitor_id, diff_date, created_at, page_type, previous_snapshot_id, \
              current_snapshot_id, diff_text, additions_count, removals_count) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(diff.competitor_id)
    .bind(ctx.scrape_date)
    .bind(ctx.scraped_at)
    .bind(diff.page_type.as_str())
    .bind(diff.previous_snapshot_id)
    .bind(diff.current_snapshot_id)
    .bind(diff.diff_text)
    .bind(diff.additions_count)
    .bind(diff.removals_count)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// All diffs for a competitor, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_diffs(pool: &SqlitePool, competitor_id: i64) -> Result<Vec<DiffRow>, DbError> {
    let rows = sqlx::query_as::<_, DiffRow>(
        "SELECT id, competitor_id, diff_date, created_at, page_type, previous_snapshot_id, \
                current_snapshot_id, diff_text, additions_count, removals_count \
         FROM diffs \
         WHERE competitor_id = ? \
         ORDER BY id",
    )
    .bind(competitor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
