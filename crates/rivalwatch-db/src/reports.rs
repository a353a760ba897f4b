//! Read-only queries behind `report`.
//!
//! Every query accepts a [`ReportFilter`]. An exact `date` takes precedence
//! over the `from`/`to` range; both range ends are inclusive.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub competitor: Option<String>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>, domain_col: &str, date_col: &str) {
        qb.push(" WHERE 1 = 1");
        if let Some(domain) = &self.competitor {
            qb.push(format!(" AND {domain_col} = "))
                .push_bind(domain.clone());
        }
        if let Some(date) = self.date {
            qb.push(format!(" AND {date_col} = ")).push_bind(date);
            return;
        }
        if let Some(from) = self.from {
            qb.push(format!(" AND {date_col} >= ")).push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(format!(" AND {date_col} <= ")).push_bind(to);
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceReportRow {
    pub domain: String,
    pub scrape_date: NaiveDate,
    pub main_price: f64,
    pub currency: String,
    pub addons: Option<String>,
    pub source_url: Option<String>,
    /// Price on the competitor's previous recorded date, regardless of filter.
    pub prev_price: Option<f64>,
}

impl PriceReportRow {
    /// Signed change against the previous recorded price.
    #[must_use]
    pub fn change(&self) -> Option<f64> {
        self.prev_price.map(|prev| self.main_price - prev)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductReportRow {
    pub domain: String,
    pub scrape_date: NaiveDate,
    pub one_way_offered: bool,
    pub one_way_price: Option<f64>,
    pub round_trip_offered: bool,
    pub round_trip_price: Option<f64>,
    pub hotel_offered: bool,
    pub hotel_price: Option<f64>,
    pub visa_letter_offered: bool,
    pub visa_letter_price: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiffReportRow {
    pub id: i64,
    pub domain: String,
    pub diff_date: NaiveDate,
    pub page_type: String,
    pub previous_snapshot_id: i64,
    pub current_snapshot_id: i64,
    pub additions_count: i64,
    pub removals_count: i64,
    pub diff_text: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AbTestReportRow {
    pub domain: String,
    pub scrape_date: NaiveDate,
    pub page_url: String,
    pub tool_name: String,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrustpilotReviewReportRow {
    pub id: i64,
    pub domain: String,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub overall_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub stars_1: Option<i64>,
    pub stars_2: Option<i64>,
    pub stars_3: Option<i64>,
    pub stars_4: Option<i64>,
    pub stars_5: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GoogleReviewReportRow {
    pub id: i64,
    pub domain: String,
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub overall_rating: Option<f64>,
    pub review_count: Option<i64>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Prices with the previous recorded price per competitor.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<PriceReportRow>, DbError> {
    // LAG runs before filtering so a single-day filter still sees the prior day.
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT domain, scrape_date, main_price, currency, addons, source_url, prev_price \
         FROM ( \
             SELECT c.domain AS domain, p.scrape_date AS scrape_date, \
                    p.main_price AS main_price, p.currency AS currency, \
                    p.addons AS addons, p.source_url AS source_url, \
                    LAG(p.main_price) OVER ( \
                        PARTITION BY p.competitor_id ORDER BY p.scrape_date \
                    ) AS prev_price \
             FROM prices_v2 p \
             JOIN competitors c ON c.id = p.competitor_id \
         )",
    );
    filter.push_where(&mut qb, "domain", "scrape_date");
    qb.push(" ORDER BY scrape_date DESC, domain");

    let rows = qb
        .build_query_as::<PriceReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<ProductReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT c.domain AS domain, p.scrape_date AS scrape_date, \
                p.one_way_offered, p.one_way_price, p.round_trip_offered, p.round_trip_price, \
                p.hotel_offered, p.hotel_price, p.visa_letter_offered, p.visa_letter_price \
         FROM products_v2 p \
         JOIN competitors c ON c.id = p.competitor_id",
    );
    filter.push_where(&mut qb, "c.domain", "p.scrape_date");
    qb.push(" ORDER BY p.scrape_date DESC, c.domain");

    let rows = qb
        .build_query_as::<ProductReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_diff_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<DiffReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT d.id, c.domain AS domain, d.diff_date, d.page_type, d.previous_snapshot_id, \
                d.current_snapshot_id, d.additions_count, d.removals_count, d.diff_text \
         FROM diffs d \
         JOIN competitors c ON c.id = d.competitor_id",
    );
    filter.push_where(&mut qb, "c.domain", "d.diff_date");
    qb.push(" ORDER BY d.id DESC");

    let rows = qb
        .build_query_as::<DiffReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ab_test_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<AbTestReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT c.domain AS domain, a.scrape_date, a.page_url, a.tool_name, a.evidence \
         FROM ab_tests a \
         JOIN competitors c ON c.id = a.competitor_id",
    );
    filter.push_where(&mut qb, "c.domain", "a.scrape_date");
    qb.push(" AND a.detected = 1 ORDER BY a.scrape_date DESC, c.domain, a.tool_name");

    let rows = qb
        .build_query_as::<AbTestReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trustpilot_review_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<TrustpilotReviewReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(TRUSTPILOT_SELECT);
    filter.push_where(&mut qb, "c.domain", "r.scrape_date");
    qb.push(" ORDER BY r.id DESC");

    let rows = qb
        .build_query_as::<TrustpilotReviewReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_google_review_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> Result<Vec<GoogleReviewReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(GOOGLE_SELECT);
    filter.push_where(&mut qb, "c.domain", "r.scrape_date");
    qb.push(" ORDER BY r.id DESC");

    let rows = qb
        .build_query_as::<GoogleReviewReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// The newest Trustpilot row per competitor. Reviews are append-only, so a
/// day that ran twice holds two rows; the higher id wins.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_trustpilot_reviews(
    pool: &SqlitePool,
) -> Result<Vec<TrustpilotReviewReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(TRUSTPILOT_SELECT);
    qb.push(
        " WHERE r.id IN (SELECT MAX(id) FROM reviews_trustpilot GROUP BY competitor_id) \
         ORDER BY c.domain",
    );

    let rows = qb
        .build_query_as::<TrustpilotReviewReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// The newest Google row per competitor.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_google_reviews(
    pool: &SqlitePool,
) -> Result<Vec<GoogleReviewReportRow>, DbError> {
    let mut qb = QueryBuilder::<Sqlite>::new(GOOGLE_SELECT);
    qb.push(
        " WHERE r.id IN (SELECT MAX(id) FROM reviews_google GROUP BY competitor_id) \
         ORDER BY c.domain",
    );

    let rows = qb
        .build_query_as::<GoogleReviewReportRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

const TRUSTPILOT_SELECT: &str = "SELECT r.id, c.domain AS domain, r.scrape_date, r.scraped_at, \
            r.overall_rating, r.review_count, r.stars_1, r.stars_2, r.stars_3, r.stars_4, \
            r.stars_5 \
     FROM reviews_trustpilot r \
     JOIN competitors c ON c.id = r.competitor_id";

const GOOGLE_SELECT: &str = "SELECT r.id, c.domain AS domain, r.scrape_date, r.scraped_at, \
            r.overall_rating, r.review_count \
     FROM reviews_google r \
     JOIN competitors c ON c.id = r.competitor_id";
