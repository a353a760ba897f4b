//! Storage tests against a migrated in-memory SQLite database.

use chrono::{NaiveDate, TimeZone, Utc};
use rivalwatch_core::{
    AbTestDetection, Addon, CompetitorConfig, PageType, PriceSignal, ProductOffer, ProductSignal,
    ReviewSignal, ReviewSource, RunContext, StarHistogram,
};
use rivalwatch_db::{
    complete_scrape_run, count_rows, create_scrape_run, fail_scrape_run, get_competitor_by_domain,
    get_previous_snapshot, get_price, get_product, get_scrape_run, insert_ab_test_detections,
    insert_diff, insert_review, insert_snapshot, latest_trustpilot_reviews, list_ab_test_report,
    list_ab_tests, list_competitors, list_diff_report, list_diffs, list_google_reviews,
    list_price_report, list_scrape_run_tasks, list_trustpilot_reviews, record_task_result,
    seed_competitors, start_scrape_run, upsert_price, upsert_product, DbError, NewDiff,
    NewSnapshot, ReportFilter, TaskResult, TaskStatus,
};
use sqlx::SqlitePool;

async fn migrated_pool() -> SqlitePool {
    let pool = rivalwatch_db::connect_in_memory()
        .await
        .expect("in-memory pool");
    rivalwatch_db::run_migrations(&pool)
        .await
        .expect("migrations apply");
    pool
}

fn competitor(domain: &str) -> CompetitorConfig {
    CompetitorConfig {
        domain: domain.to_string(),
        base_url: format!("https://{domain}/"),
    }
}

async fn seeded_pool() -> (SqlitePool, i64) {
    let pool = migrated_pool().await;
    seed_competitors(
        &pool,
        &[competitor("onwardticket.com"), competitor("vizafly.com")],
    )
    .await
    .unwrap();
    let id = get_competitor_by_domain(&pool, "onwardticket.com")
        .await
        .unwrap()
        .expect("seeded")
        .id;
    (pool, id)
}

fn ctx_on(day: u32, hour: u32) -> RunContext {
    RunContext::at(Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0).unwrap())
}

fn price(main_price: f64, addons: Vec<Addon>) -> PriceSignal {
    PriceSignal {
        main_price,
        currency: "USD".to_string(),
        addons,
        source_url: "https://onwardticket.com".to_string(),
    }
}

// ---------------------------------------------------------------------------
// competitors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seeding_is_insert_if_absent() {
    let pool = migrated_pool().await;
    let first = seed_competitors(&pool, &[competitor("dummyticket.com")])
        .await
        .unwrap();
    let second = seed_competitors(
        &pool,
        &[competitor("dummyticket.com"), competitor("vizafly.com")],
    )
    .await
    .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 1);

    let rows = list_competitors(&pool).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].domain, "dummyticket.com");
    assert_eq!(rows[0].base_url, "https://dummyticket.com");
}

// ---------------------------------------------------------------------------
// prices / products
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_day_price_upsert_keeps_one_row() {
    let (pool, id) = seeded_pool().await;
    let morning = ctx_on(2, 6);
    let evening = ctx_on(2, 18);

    let mut conn = pool.acquire().await.unwrap();
    upsert_price(&mut conn, id, &morning, &price(16.0, Vec::new()))
        .await
        .unwrap();
    upsert_price(
        &mut conn,
        id,
        &evening,
        &price(
            14.0,
            vec![Addon {
                name: "Round Trip".to_string(),
                price: 7.0,
            }],
        ),
    )
    .await
    .unwrap();
    drop(conn);

    assert_eq!(count_rows(&pool, "prices_v2").await.unwrap(), 1);
    let row = get_price(&pool, id, morning.scrape_date)
        .await
        .unwrap()
        .expect("row for date");
    assert!((row.main_price - 14.0).abs() < f64::EPSILON);
    assert_eq!(row.scraped_at, evening.scraped_at);
    let addons = row.parsed_addons().unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].name, "Round Trip");
}

#[tokio::test]
async fn empty_addons_are_stored_as_null() {
    let (pool, id) = seeded_pool().await;
    let ctx = ctx_on(3, 6);
    let mut conn = pool.acquire().await.unwrap();
    upsert_price(&mut conn, id, &ctx, &price(16.0, Vec::new()))
        .await
        .unwrap();
    drop(conn);

    let row = get_price(&pool, id, ctx.scrape_date).await.unwrap().unwrap();
    assert!(row.addons.is_none());
    assert!(row.parsed_addons().unwrap().is_empty());
}

#[tokio::test]
async fn product_upsert_replaces_same_day_row() {
    let (pool, id) = seeded_pool().await;
    let ctx = ctx_on(4, 6);
    let mut signal = ProductSignal::empty("https://onwardticket.com");
    signal.one_way = ProductOffer {
        offered: true,
        price: Some(12.0),
    };

    let mut conn = pool.acquire().await.unwrap();
    upsert_product(&mut conn, id, &ctx, &signal).await.unwrap();
    signal.hotel.offered = true;
    upsert_product(&mut conn, id, &ctx, &signal).await.unwrap();
    drop(conn);

    assert_eq!(count_rows(&pool, "products_v2").await.unwrap(), 1);
    let row = get_product(&pool, id, ctx.scrape_date)
        .await
        .unwrap()
        .unwrap();
    assert!(row.one_way_offered);
    assert_eq!(row.one_way_price, Some(12.0));
    assert!(row.hotel_offered);
    assert!(!row.visa_letter_offered);
    assert_eq!(row.source_url.as_deref(), Some("https://onwardticket.com"));
}

// ---------------------------------------------------------------------------
// snapshots / diffs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn previous_snapshot_is_scoped_to_competitor_and_page_type() {
    let (pool, id) = seeded_pool().await;
    let other = get_competitor_by_domain(&pool, "vizafly.com")
        .await
        .unwrap()
        .unwrap()
        .id;
    let ctx = ctx_on(5, 6);
    let mut conn = pool.acquire().await.unwrap();

    let snap = |competitor_id, page_type| NewSnapshot {
        competitor_id,
        page_type,
        page_url: "https://onwardticket.com",
        html_content: "<p>hi</p>",
        content_hash: "abc",
    };

    let first = insert_snapshot(&mut conn, &ctx, &snap(id, PageType::Homepage))
        .await
        .unwrap();
    insert_snapshot(&mut conn, &ctx, &snap(id, PageType::Pricing))
        .await
        .unwrap();
    insert_snapshot(&mut conn, &ctx, &snap(other, PageType::Homepage))
        .await
        .unwrap();
    let latest = insert_snapshot(&mut conn, &ctx, &snap(id, PageType::Homepage))
        .await
        .unwrap();

    let previous = get_previous_snapshot(&mut conn, id, PageType::Homepage, latest)
        .await
        .unwrap()
        .expect("earlier homepage snapshot");
    assert_eq!(previous.id, first);
    assert_eq!(previous.page_type, "homepage");

    let none = get_previous_snapshot(&mut conn, id, PageType::Homepage, first)
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn diff_rows_reference_both_snapshots() {
    let (pool, id) = seeded_pool().await;
    let ctx = ctx_on(6, 6);
    let mut conn = pool.acquire().await.unwrap();
    let snapshot = NewSnapshot {
        competitor_id: id,
        page_type: PageType::Pricing,
        page_url: "https://onwardticket.com/pricing",
        html_content: "<p>$16</p>",
        content_hash: "h1",
    };
    let a = insert_snapshot(&mut conn, &ctx, &snapshot).await.unwrap();
    let b = insert_snapshot(&mut conn, &ctx, &snapshot).await.unwrap();
    insert_diff(
        &mut conn,
        &ctx,
        &NewDiff {
            competitor_id: id,
            page_type: PageType::Pricing,
            previous_snapshot_id: a,
            current_snapshot_id: b,
            diff_text: "--- snapshot:1\n+++ snapshot:2\n-$16\n+$14",
            additions_count: 1,
            removals_count: 1,
        },
    )
    .await
    .unwrap();
    drop(conn);

    let diffs = list_diffs(&pool, id).await.unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].previous_snapshot_id, a);
    assert_eq!(diffs[0].current_snapshot_id, b);
    assert_eq!(diffs[0].diff_date, ctx.scrape_date);

    let report = list_diff_report(
        &pool,
        &ReportFilter {
            competitor: Some("onwardticket.com".to_string()),
            ..ReportFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].page_type, "pricing");
}

// ---------------------------------------------------------------------------
// reviews / ab tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reviews_are_append_only_and_latest_wins() {
    let (pool, id) = seeded_pool().await;
    let ctx = ctx_on(7, 6);
    let mut histogram = StarHistogram::default();
    histogram.set(5, 700);
    histogram.set(1, 20);

    let review = |rating: f64| ReviewSignal {
        source: ReviewSource::Trustpilot,
        overall_rating: Some(rating),
        review_count: Some(812),
        histogram: Some(histogram),
        source_url: "https://www.trustpilot.com/review/onwardticket.com".to_string(),
    };

    let mut conn = pool.acquire().await.unwrap();
    insert_review(&mut conn, id, &ctx, &review(4.4)).await.unwrap();
    insert_review(&mut conn, id, &ctx, &review(4.6)).await.unwrap();
    insert_review(
        &mut conn,
        id,
        &ctx,
        &ReviewSignal {
            source: ReviewSource::Google,
            overall_rating: None,
            review_count: Some(31),
            histogram: None,
            source_url: "https://www.google.com/search?q=onwardticket.com".to_string(),
        },
    )
    .await
    .unwrap();
    drop(conn);

    let all = list_trustpilot_reviews(&pool, id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].stars_5, Some(700));
    assert_eq!(all[0].stars_3, None);

    let latest = latest_trustpilot_reviews(&pool).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].overall_rating, Some(4.6));

    let google = list_google_reviews(&pool, id).await.unwrap();
    assert_eq!(google.len(), 1);
    assert_eq!(google[0].overall_rating, None);
    assert_eq!(google[0].review_count, Some(31));
}

#[tokio::test]
async fn ab_test_detections_are_stored_as_detected() {
    let (pool, id) = seeded_pool().await;
    let ctx = ctx_on(8, 6);
    let detections = vec![
        AbTestDetection {
            tool_name: "optimizely".to_string(),
            evidence: "src=\"https://cdn.optimizely.com/js/1.js\"".to_string(),
        },
        AbTestDetection {
            tool_name: "vwo".to_string(),
            evidence: "window._vwo_code".to_string(),
        },
    ];

    let mut conn = pool.acquire().await.unwrap();
    let inserted =
        insert_ab_test_detections(&mut conn, id, &ctx, "https://onwardticket.com", &detections)
            .await
            .unwrap();
    drop(conn);

    assert_eq!(inserted, 2);
    let rows = list_ab_tests(&pool, id).await.unwrap();
    assert!(rows.iter().all(|r| r.detected));
    assert_eq!(rows[1].tool_name, "vwo");

    let report = list_ab_test_report(
        &pool,
        &ReportFilter {
            date: Some(ctx.scrape_date),
            ..ReportFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(report.len(), 2);
}

// ---------------------------------------------------------------------------
// reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn price_report_carries_previous_price_through_filters() {
    let (pool, id) = seeded_pool().await;
    let mut conn = pool.acquire().await.unwrap();
    upsert_price(&mut conn, id, &ctx_on(10, 6), &price(16.0, Vec::new()))
        .await
        .unwrap();
    upsert_price(&mut conn, id, &ctx_on(11, 6), &price(14.0, Vec::new()))
        .await
        .unwrap();
    upsert_price(&mut conn, id, &ctx_on(12, 6), &price(14.0, Vec::new()))
        .await
        .unwrap();
    drop(conn);

    let day = NaiveDate::from_ymd_opt(2026, 4, 11).unwrap();
    let single = list_price_report(
        &pool,
        &ReportFilter {
            competitor: Some("onwardticket.com".to_string()),
            date: Some(day),
            // ignored when an exact date is present
            from: Some(NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()),
            to: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].prev_price, Some(16.0));
    assert_eq!(single[0].change(), Some(-2.0));

    let range = list_price_report(
        &pool,
        &ReportFilter {
            competitor: None,
            date: None,
            from: Some(day),
            to: Some(NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()),
        },
    )
    .await
    .unwrap();
    assert_eq!(range.len(), 2);
    assert_eq!(range[0].scrape_date, NaiveDate::from_ymd_opt(2026, 4, 12).unwrap());
    assert_eq!(range[0].change(), Some(0.0));

    let unknown = list_price_report(
        &pool,
        &ReportFilter {
            competitor: Some("nobody.example".to_string()),
            ..ReportFilter::default()
        },
    )
    .await
    .unwrap();
    assert!(unknown.is_empty());
}

// ---------------------------------------------------------------------------
// scrape runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scrape_run_lifecycle_records_tasks() {
    let pool = migrated_pool().await;
    let day = NaiveDate::from_ymd_opt(2026, 4, 20).unwrap();
    let run = create_scrape_run(&pool, day, "cli").await.unwrap();
    assert_eq!(run.status, "queued");

    start_scrape_run(&pool, run.id).await.unwrap();
    record_task_result(
        &pool,
        run.id,
        &TaskResult {
            task_name: "pricing".to_string(),
            status: TaskStatus::Success,
            rows_inserted: 5,
            duration_ms: 1234,
            error_message: None,
        },
    )
    .await
    .unwrap();
    record_task_result(
        &pool,
        run.id,
        &TaskResult {
            task_name: "reviews_google".to_string(),
            status: TaskStatus::Failed,
            rows_inserted: 0,
            duration_ms: 10,
            error_message: Some("boom".to_string()),
        },
    )
    .await
    .unwrap();
    complete_scrape_run(&pool, run.id, 5).await.unwrap();

    let stored = get_scrape_run(&pool, run.id).await.unwrap();
    assert_eq!(stored.status, "succeeded");
    assert_eq!(stored.rows_inserted, 5);
    assert_eq!(stored.public_id, run.public_id);
    assert!(stored.completed_at.is_some());

    let tasks = list_scrape_run_tasks(&pool, run.id).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].task_name, "pricing");
    assert_eq!(tasks[1].status, "failed");
    assert_eq!(tasks[1].error_message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn finished_run_rejects_further_transitions() {
    let pool = migrated_pool().await;
    let day = NaiveDate::from_ymd_opt(2026, 4, 21).unwrap();
    let run = create_scrape_run(&pool, day, "cli").await.unwrap();

    let err = complete_scrape_run(&pool, run.id, 0).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidRunTransition {
            expected_status: "running",
            ..
        }
    ));

    start_scrape_run(&pool, run.id).await.unwrap();
    fail_scrape_run(&pool, run.id, 0, "all tasks failed")
        .await
        .unwrap();
    assert!(start_scrape_run(&pool, run.id).await.is_err());
    assert_eq!(
        get_scrape_run(&pool, run.id).await.unwrap().error_message.as_deref(),
        Some("all tasks failed")
    );
}

#[tokio::test]
async fn missing_run_is_not_found() {
    let pool = migrated_pool().await;
    assert!(matches!(
        get_scrape_run(&pool, 999).await,
        Err(DbError::NotFound)
    ));
}
