//! Startup repair for tables created before the versioned migrations existed.
//!
//! The migrations use `CREATE TABLE IF NOT EXISTS`, so an older table survives
//! them untouched. This pass adds any column the current code reads and, where
//! an older column carried the same data under a different name, copies it
//! across.

use sqlx::SqlitePool;

use crate::DbError;

/// `(table, column, declaration)` for every column added after the first
/// release of its table.
const EXPECTED_COLUMNS: &[(&str, &str, &str)] = &[
    ("reviews_trustpilot", "review_count", "INTEGER"),
    ("reviews_trustpilot", "stars_1", "INTEGER"),
    ("reviews_trustpilot", "stars_2", "INTEGER"),
    ("reviews_trustpilot", "stars_3", "INTEGER"),
    ("reviews_trustpilot", "stars_4", "INTEGER"),
    ("reviews_trustpilot", "stars_5", "INTEGER"),
    ("reviews_trustpilot", "source_url", "TEXT"),
    ("reviews_google", "review_count", "INTEGER"),
    ("reviews_google", "source_url", "TEXT"),
    ("prices_v2", "addons", "TEXT"),
    ("prices_v2", "source_url", "TEXT"),
    ("products_v2", "source_url", "TEXT"),
    ("ab_tests", "evidence", "TEXT"),
];

/// `(table, old column, current column)` pairs backfilled after a repair.
const RENAMED_COLUMNS: &[(&str, &str, &str)] = &[
    ("reviews_trustpilot", "total_reviews", "review_count"),
    ("reviews_trustpilot", "rating_1", "stars_1"),
    ("reviews_trustpilot", "rating_2", "stars_2"),
    ("reviews_trustpilot", "rating_3", "stars_3"),
    ("reviews_trustpilot", "rating_4", "stars_4"),
    ("reviews_trustpilot", "rating_5", "stars_5"),
    ("reviews_google", "total_reviews", "review_count"),
];

/// Add missing columns to existing tables. Idempotent.
///
/// Returns the `table.column` names that were added.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if inspecting or altering a table fails.
pub async fn repair_legacy_columns(pool: &SqlitePool) -> Result<Vec<String>, DbError> {
    let mut added = Vec::new();

    for (table, column, declaration) in EXPECTED_COLUMNS {
        let existing = table_columns(pool, table).await?;
        if existing.is_empty() {
            continue;
        }
        if existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            continue;
        }

        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {declaration}"))
            .execute(pool)
            .await?;
        added.push(format!("{table}.{column}"));

        if let Some((_, old, _)) = RENAMED_COLUMNS
            .iter()
            .find(|(t, _, current)| t == table && current == column)
        {
            if existing.iter().any(|c| c.eq_ignore_ascii_case(old)) {
                sqlx::query(&format!(
                    "UPDATE {table} SET {column} = {old} WHERE {column} IS NULL"
                ))
                .execute(pool)
                .await?;
            }
        }
    }

    Ok(added)
}

/// Column names of `table`, empty when the table does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the pragma query fails.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, DbError> {
    let names = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_in_memory, run_migrations};

    #[tokio::test]
    async fn repairs_pre_migration_review_table() {
        let pool = connect_in_memory().await.unwrap();
        sqlx::query(
            "CREATE TABLE competitors (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             domain TEXT NOT NULL UNIQUE, base_url TEXT NOT NULL, \
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE reviews_trustpilot (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             competitor_id INTEGER NOT NULL, scrape_date TEXT NOT NULL, \
             scraped_at TEXT NOT NULL, overall_rating REAL, total_reviews INTEGER, \
             rating_1 INTEGER, rating_2 INTEGER, rating_3 INTEGER, rating_4 INTEGER, \
             rating_5 INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO reviews_trustpilot \
             (competitor_id, scrape_date, scraped_at, overall_rating, total_reviews, rating_5) \
             VALUES (1, '2026-01-02', '2026-01-02T06:00:00+00:00', 4.5, 812, 700)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let summary = run_migrations(&pool).await.unwrap();
        assert!(summary
            .repaired_columns
            .contains(&"reviews_trustpilot.review_count".to_string()));
        assert!(summary
            .repaired_columns
            .contains(&"reviews_trustpilot.source_url".to_string()));

        let (count, five): (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT review_count, stars_5 FROM reviews_trustpilot")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, Some(812));
        assert_eq!(five, Some(700));

        let again = repair_legacy_columns(&pool).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn missing_table_has_no_columns() {
        let pool = connect_in_memory().await.unwrap();
        assert!(table_columns(&pool, "nope").await.unwrap().is_empty());
    }
}
