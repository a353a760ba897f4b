//! End-to-end runs against a wiremock site and a migrated in-memory database.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use rivalwatch_core::CompetitorConfig;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const HOMEPAGE: &str = r#"<html><head>
    <script src="https://cdn.optimizely.com/js/1.js"></script>
    </head><body><h1>Onward tickets</h1><p>Book your ticket from just $16</p></body></html>"#;

const PRICING_PAGE: &str = "<html><body><h2>One way ticket</h2><p>$16</p>\
    <h2>Round trip</h2><p>$25</p></body></html>";

const PRICING_PAGE_CHANGED: &str = "<html><body><h2>One way ticket</h2><p>$14</p>\
    <h2>Round trip</h2><p>$25</p></body></html>";

const TRUSTPILOT_PAGE: &str = r#"<script type="application/ld+json">
    {"@type": "Organization", "aggregateRating": {"ratingValue": "4.6", "reviewCount": "2,451"}}
    </script>"#;

const GOOGLE_PAGE: &str = "<div><span>4.8 stars</span><span>312 reviews</span></div>";

fn run_ctx() -> RunContext {
    RunContext::at(Utc.with_ymd_and_hms(2026, 4, 2, 6, 0, 0).unwrap())
}

/// Seeds `alpha.test` and `beta.test`, both served under the mock server.
async fn seeded_pool(server: &MockServer) -> (SqlitePool, i64, i64) {
    let pool = rivalwatch_db::connect_in_memory().await.unwrap();
    rivalwatch_db::run_migrations(&pool).await.unwrap();

    let competitors: Vec<CompetitorConfig> = ["alpha", "beta"]
        .iter()
        .map(|name| CompetitorConfig {
            domain: format!("{name}.test"),
            base_url: format!("{}/{name}", server.uri()),
        })
        .collect();
    rivalwatch_db::seed_competitors(&pool, &competitors)
        .await
        .unwrap();

    let stored = rivalwatch_db::list_competitors(&pool).await.unwrap();
    (pool, stored[0].id, stored[1].id)
}

async fn mount(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Serves every page `alpha.test` has; `beta.test` answers 404 everywhere.
async fn mount_alpha(server: &MockServer, pricing_page: &str) {
    mount(server, "/alpha", HOMEPAGE).await;
    mount(server, "/alpha/pricing", pricing_page).await;
    mount(server, "/review/alpha.test", TRUSTPILOT_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "alpha.test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GOOGLE_PAGE))
        .mount(server)
        .await;
}

fn status_of<'a>(results: &'a [TaskResult], name: &str) -> &'a TaskResult {
    results
        .iter()
        .find(|r| r.task_name == name)
        .unwrap_or_else(|| panic!("no result for {name}"))
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_run_records_every_task_and_repeat_run_only_adds_diffs() {
    let server = MockServer::start().await;
    mount_alpha(&server, PRICING_PAGE).await;
    let (pool, alpha_id, beta_id) = seeded_pool(&server).await;

    let fetcher = PageFetcher::new(5, 0).unwrap();
    let trustpilot = format!("{}/review", server.uri());
    let google = format!("{}/search", server.uri());
    let collector = Collector {
        pool: &pool,
        fetcher: &fetcher,
        trustpilot_base_url: &trustpilot,
        google_search_url: &google,
        ctx: run_ctx(),
    };

    let first = run_daily(&collector, &TaskKind::ALL, "test").await.unwrap();
    assert!(first.succeeded);
    let expected_rows = [
        ("pricing", 1),
        ("products", 1),
        ("snapshots", 2),
        ("reviews_trustpilot", 1),
        ("reviews_google", 1),
        ("ab_tests", 1),
    ];
    for (name, rows) in expected_rows {
        let result = status_of(&first.results, name);
        assert_eq!(result.status, TaskStatus::Success, "{name}");
        assert_eq!(result.rows_inserted, rows, "{name}");
    }

    let run = rivalwatch_db::get_scrape_run(&pool, first.run_id).await.unwrap();
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.rows_inserted, 7);
    let tasks = rivalwatch_db::list_scrape_run_tasks(&pool, first.run_id)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 6);

    let price = rivalwatch_db::get_price(&pool, alpha_id, run_ctx().scrape_date)
        .await
        .unwrap()
        .expect("alpha price");
    assert_eq!(price.main_price, 16.0);
    assert!(rivalwatch_db::get_price(&pool, beta_id, run_ctx().scrape_date)
        .await
        .unwrap()
        .is_none());

    // Same day, pricing page changed.
    server.reset().await;
    mount_alpha(&server, PRICING_PAGE_CHANGED).await;

    let second = run_daily(&collector, &TaskKind::ALL, "test").await.unwrap();
    assert!(second.succeeded);
    assert_eq!(status_of(&second.results, "pricing").rows_inserted, 0);
    assert_eq!(status_of(&second.results, "products").rows_inserted, 0);
    assert_eq!(status_of(&second.results, "snapshots").rows_inserted, 3);
    assert_eq!(rivalwatch_db::count_rows(&pool, "prices_v2").await.unwrap(), 1);
    assert_eq!(rivalwatch_db::count_rows(&pool, "products_v2").await.unwrap(), 1);

    let diffs = rivalwatch_db::list_diffs(&pool, alpha_id).await.unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].page_type, "pricing");
    assert!(diffs[0].previous_snapshot_id < diffs[0].current_snapshot_id);
    assert_eq!(diffs[0].additions_count, 1);
    assert_eq!(diffs[0].removals_count, 1);
}

#[tokio::test]
async fn timed_out_competitor_does_not_block_the_next_one() {
    let server = MockServer::start().await;
    for route in ["/alpha", "/alpha/pricing"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>From $5</p>")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
    }
    mount(&server, "/beta", "<p>Tickets from $9</p>").await;
    let (pool, alpha_id, beta_id) = seeded_pool(&server).await;

    let fetcher = PageFetcher::new(1, 0).unwrap();
    let collector = Collector {
        pool: &pool,
        fetcher: &fetcher,
        trustpilot_base_url: "http://127.0.0.1:1/review",
        google_search_url: "http://127.0.0.1:1/search",
        ctx: run_ctx(),
    };

    let report = run_daily(&collector, &[TaskKind::Pricing], "test")
        .await
        .unwrap();

    let pricing = status_of(&report.results, "pricing");
    assert_eq!(pricing.status, TaskStatus::Success);
    assert_eq!(pricing.rows_inserted, 1);
    let date = run_ctx().scrape_date;
    assert!(rivalwatch_db::get_price(&pool, alpha_id, date)
        .await
        .unwrap()
        .is_none());
    let beta = rivalwatch_db::get_price(&pool, beta_id, date)
        .await
        .unwrap()
        .expect("beta price after alpha timed out");
    assert_eq!(beta.main_price, 9.0);
}

#[tokio::test]
async fn unreachable_pages_are_no_data_not_failures() {
    let server = MockServer::start().await;
    let (pool, _, _) = seeded_pool(&server).await;

    let fetcher = PageFetcher::new(5, 0).unwrap();
    let base = server.uri();
    let collector = Collector {
        pool: &pool,
        fetcher: &fetcher,
        trustpilot_base_url: &base,
        google_search_url: &base,
        ctx: run_ctx(),
    };

    let report = run_daily(&collector, &[TaskKind::Pricing, TaskKind::AbTests], "test")
        .await
        .unwrap();

    assert!(report.succeeded);
    for result in &report.results {
        assert_eq!(result.status, TaskStatus::NoData);
        assert_eq!(result.rows_inserted, 0);
        assert!(result.error_message.is_none());
    }
    let run = rivalwatch_db::get_scrape_run(&pool, report.run_id).await.unwrap();
    assert_eq!(run.status, "succeeded");
}

#[tokio::test]
async fn run_fails_only_when_every_task_failed() {
    let server = MockServer::start().await;
    mount_alpha(&server, PRICING_PAGE).await;
    let (pool, _, _) = seeded_pool(&server).await;
    sqlx::query("DROP TABLE prices_v2")
        .execute(&pool)
        .await
        .unwrap();

    let fetcher = PageFetcher::new(5, 0).unwrap();
    let base = server.uri();
    let collector = Collector {
        pool: &pool,
        fetcher: &fetcher,
        trustpilot_base_url: &base,
        google_search_url: &base,
        ctx: run_ctx(),
    };

    let failed = run_daily(&collector, &[TaskKind::Pricing], "test")
        .await
        .unwrap();
    assert!(!failed.succeeded);
    let pricing = status_of(&failed.results, "pricing");
    assert_eq!(pricing.status, TaskStatus::Failed);
    assert_eq!(pricing.rows_inserted, 0);
    assert!(pricing
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("alpha.test")));
    let run = rivalwatch_db::get_scrape_run(&pool, failed.run_id).await.unwrap();
    assert_eq!(run.status, "failed");

    let mixed = run_daily(&collector, &[TaskKind::Pricing, TaskKind::AbTests], "test")
        .await
        .unwrap();
    assert!(mixed.succeeded);
    assert_eq!(status_of(&mixed.results, "ab_tests").status, TaskStatus::Success);
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[test]
fn summary_lists_tasks_as_csv_with_millisecond_precision() {
    let results = vec![
        TaskResult {
            task_name: "pricing".to_string(),
            status: TaskStatus::Success,
            rows_inserted: 5,
            duration_ms: 1234,
            error_message: None,
        },
        TaskResult {
            task_name: "reviews_google".to_string(),
            status: TaskStatus::NoData,
            rows_inserted: 0,
            duration_ms: 7,
            error_message: None,
        },
    ];

    assert_eq!(
        format_summary(&results),
        "SCRAPER DAILY SUMMARY\n\
         name,status,rows_inserted,duration_seconds\n\
         pricing,success,5,1.234\n\
         reviews_google,no_data,0,0.007\n"
    );
}

#[test]
fn task_kinds_cover_every_signal_table() {
    let mut tables: Vec<&str> = TaskKind::ALL
        .iter()
        .flat_map(|task| task.tables().iter().copied())
        .collect();
    tables.sort_unstable();
    let mut tracked = rivalwatch_db::SIGNAL_TABLES.to_vec();
    tracked.sort_unstable();
    assert_eq!(tables, tracked);
}
