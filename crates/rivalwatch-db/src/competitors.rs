use chrono::{DateTime, Utc};
use rivalwatch_core::CompetitorConfig;
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `competitors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorRow {
    pub id: i64,
    pub domain: String,
    pub base_url: String,
    pub created_at: DateTime<Utc>,
}

/// Insert competitors from config, leaving existing domains untouched.
///
/// Returns the number of newly inserted competitors. All inserts run inside a
/// single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_competitors(
    pool: &SqlitePool,
    competitors: &[CompetitorConfig],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;
    let created_at = Utc::now();

    for competitor in competitors {
        let result = sqlx::query(
            "INSERT INTO competitors (domain, base_url, created_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT (domain) DO NOTHING",
        )
        .bind(competitor.domain.trim())
        .bind(competitor.base_url.trim_end_matches('/'))
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// All competitors in seeding order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_competitors(pool: &SqlitePool) -> Result<Vec<CompetitorRow>, DbError> {
    let rows = sqlx::query_as::<_, CompetitorRow>(
        "SELECT id, domain, base_url, created_at FROM competitors ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_competitor_by_domain(
    pool: &SqlitePool,
    domain: &str,
) -> Result<Option<CompetitorRow>, DbError> {
    let row = sqlx::query_as::<_, CompetitorRow>(
        "SELECT id, domain, base_url, created_at FROM competitors WHERE domain = ?",
    )
    .bind(domain)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
