//! Database operations for `reviews_trustpilot` and `reviews_google`.
//!
//! Both tables are append-only: every run adds a row, and readers take the
//! latest row per competitor (see [`crate::reports`]).

use chrono::{DateTime, NaiveDate, Utc};
use rivalwatch_core::{ReviewSignal, ReviewSource, RunContext};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `reviews_trustpilot` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrustpilotReviewRow {
    pub id: i64,
    pub competitor_id: i64,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub overall_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub stars_1: Option<i64>,
    pub stars_2: Option<i64>,
    pub stars_3: Option<i64>,
    pub stars_4: Option<i64>,
    pub stars_5: Option<i64>,
    pub source_url: Option<String>,
}

/// A row from the `reviews_google` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GoogleReviewRow {
    pub id: i64,
    pub competitor_id: i64,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub overall_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub source_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Append a review observation to the table matching `signal.source`.
///
/// Returns the new row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_review(
    conn: &mut SqliteConnection,
    competitor_id: i64,
    ctx: &RunContext,
    signal: &ReviewSignal,
) -> Result<i64, DbError> {
    let id = match signal.source {
        ReviewSource::Trustpilot => {
            let histogram = signal.histogram.unwrap_or_default();
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO reviews_trustpilot \
                     (competitor_id, scrape_date, scraped_at, overall_rating, review_count, \
                      stars_1, stars_2, stars_3, stars_4, stars_5, source_url) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(competitor_id)
            .bind(ctx.scrape_date)
            .bind(ctx.scraped_at)
            .bind(signal.overall_rating)
            .bind(signal.review_count)
            .bind(histogram.get(1))
            .bind(histogram.get(2))
            .bind(histogram.get(3))
            .bind(histogram.get(4))
            .bind(histogram.get(5))
            .bind(&signal.source_url)
            .fetch_one(&mut *conn)
            .await?
        }
        ReviewSource::Google => {
            sqlx::query_scalar::<_, i64>(
                "INSERT INTO reviews_google \
                     (competitor_id, scrape_date, scraped_at, overall_rating, review_count, \
                      source_url) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(competitor_id)
            .bind(ctx.scrape_date)
            .bind(ctx.scraped_at)
            .bind(signal.overall_rating)
            .bind(signal.review_count)
            .bind(&signal.source_url)
            .fetch_one(&mut *conn)
            .await?
        }
    };

    Ok(id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Every Trustpilot observation for a competitor, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trustpilot_reviews(
    pool: &SqlitePool,
    competitor_id: i64,
) -> Result<Vec<TrustpilotReviewRow>, DbError> {
    let rows = sqlx::query_as::<_, TrustpilotReviewRow>(
        "SELECT id, competitor_id, scrape_date, scraped_at, overall_rating, review_count, \
                stars_1, stars_2, stars_3, stars_4, stars_5, source_url \
         FROM reviews_trustpilot \
         WHERE competitor_id = ? \
         ORDER BY id",
    )
    .bind(competitor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every Google observation for a competitor, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_google_reviews(
    pool: &SqlitePool,
    competitor_id: i64,
) -> Result<Vec<GoogleReviewRow>, DbError> {
    let rows = sqlx::query_as::<_, GoogleReviewRow>(
        "SELECT id, competitor_id, scrape_date, scraped_at, overall_rating, review_count, \
                source_url \
         FROM reviews_google \
         WHERE competitor_id = ? \
         ORDER BY id",
    )
    .bind(competitor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
