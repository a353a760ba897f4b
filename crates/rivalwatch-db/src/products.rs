//! Database operations for `products_v2`.

use chrono::{DateTime, NaiveDate, Utc};
use rivalwatch_core::{ProductSignal, RunContext};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `products_v2` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub competitor_id: i64,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub one_way_offered: bool,
    pub one_way_price: Option<f64>,
    pub round_trip_offered: bool,
    pub round_trip_price: Option<f64>,
    pub hotel_offered: bool,
    pub hotel_price: Option<f64>,
    pub visa_letter_offered: bool,
    pub visa_letter_price: Option<f64>,
    pub source_url: Option<String>,
}

/// Insert or replace the product matrix for `(competitor_id, scrape_date)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the write fails.
pub async fn upsert_product(
    conn: &mut SqliteConnection,
    competitor_id: i64,
    ctx: &RunContext,
    signal: &ProductSignal,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT OR REPLACE INTO products_v2 \
             (competitor_id, scrape_date, scraped_at, \
              one_way_offered, one_way_price, round_trip_offered, round_trip_price, \
              hotel_offered, hotel_price, visa_letter_offered, visa_letter_price, source_url) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(competitor_id)
    .bind(ctx.scrape_date)
    .bind(ctx.scraped_at)
    .bind(signal.one_way.offered)
    .bind(signal.one_way.price)
    .bind(signal.round_trip.offered)
    .bind(signal.round_trip.price)
    .bind(signal.hotel.offered)
    .bind(signal.hotel.price)
    .bind(signal.visa_letter.offered)
    .bind(signal.visa_letter.price)
    .bind(&signal.source_url)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(
    pool: &SqlitePool,
    competitor_id: i64,
    scrape_date: NaiveDate,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, competitor_id, scrape_date, scraped_at, \
                one_way_offered, one_way_price, round_trip_offered, round_trip_price, \
                hotel_offered, hotel_price, visa_letter_offered, visa_letter_price, source_url \
         FROM products_v2 \
         WHERE competitor_id = ? AND scrape_date = ?",
    )
    .bind(competitor_id)
    .bind(scrape_date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
