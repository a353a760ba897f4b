//! Database operations for `prices_v2`.

use chrono::{DateTime, NaiveDate, Utc};
use rivalwatch_core::{Addon, PriceSignal, RunContext};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `prices_v2` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRow {
    pub id: i64,
    pub competitor_id: i64,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub main_price: f64,
    pub currency: String,
    /// JSON list of `{name, price}`; `NULL` when the page showed no add-ons.
    pub addons: Option<String>,
    pub source_url: Option<String>,
}

impl PriceRow {
    /// Decode the stored add-on list.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the column holds malformed JSON.
    pub fn parsed_addons(&self) -> Result<Vec<Addon>, serde_json::Error> {
        self.addons
            .as_deref()
            .map_or_else(|| Ok(Vec::new()), serde_json::from_str)
    }
}

/// Insert or replace the price for `(competitor_id, scrape_date)`.
///
/// A second call on the same date replaces the first, so re-running a day
/// keeps exactly one row per competitor.
///
/// # Errors
///
/// Returns [`DbError::Encode`] if the add-ons cannot be serialized, or
/// [`DbError::Sqlx`] if the write fails.
pub async fn upsert_price(
    conn: &mut SqliteConnection,
    competitor_id: i64,
    ctx: &RunContext,
    signal: &PriceSignal,
) -> Result<(), DbError> {
    let addons = if signal.addons.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&signal.addons)?)
    };

    sqlx::query(
        "INSERT OR REPLACE INTO prices_v2 \
             (competitor_id, scrape_date, scraped_at, main_price, currency, addons, source_url) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(competitor_id)
    .bind(ctx.scrape_date)
    .bind(ctx.scraped_at)
    .bind(signal.main_price)
    .bind(&signal.currency)
    .bind(addons)
    .bind(&signal.source_url)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_price(
    pool: &SqlitePool,
    competitor_id: i64,
    scrape_date: NaiveDate,
) -> Result<Option<PriceRow>, DbError> {
    let row = sqlx::query_as::<_, PriceRow>(
        "SELECT id, competitor_id, scrape_date, scraped_at, main_price, currency, addons, \
                source_url \
         FROM prices_v2 \
         WHERE competitor_id = ? AND scrape_date = ?",
    )
    .bind(competitor_id)
    .bind(scrape_date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
