//! Read-only `report` command: fixed-width tables over stored signals.

use std::fmt::Write as _;

use clap::ValueEnum;
use rivalwatch_db::{
    AbTestReportRow, CompetitorRow, DiffReportRow, GoogleReviewReportRow, PriceReportRow,
    ProductReportRow, ReportFilter, ScrapeRunRow, TrustpilotReviewReportRow,
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReportKind {
    Prices,
    Products,
    Diffs,
    AbTests,
    ReviewsTrustpilot,
    ReviewsGoogle,
    Competitors,
    Runs,
}

/// Prints one report to stdout.
///
/// # Errors
///
/// Returns an error if the underlying query fails.
pub(crate) async fn run_report(
    pool: &SqlitePool,
    kind: ReportKind,
    filter: &ReportFilter,
    latest: bool,
    limit: i64,
) -> anyhow::Result<()> {
    let rendered = match kind {
        ReportKind::Prices => render_prices(&rivalwatch_db::list_price_report(pool, filter).await?),
        ReportKind::Products => {
            render_products(&rivalwatch_db::list_product_report(pool, filter).await?)
        }
        ReportKind::Diffs => render_diffs(&rivalwatch_db::list_diff_report(pool, filter).await?),
        ReportKind::AbTests => {
            render_ab_tests(&rivalwatch_db::list_ab_test_report(pool, filter).await?)
        }
        ReportKind::ReviewsTrustpilot => {
            let mut rows = if latest {
                rivalwatch_db::latest_trustpilot_reviews(pool).await?
            } else {
                rivalwatch_db::list_trustpilot_review_report(pool, filter).await?
            };
            if latest {
                rows.retain(|r| matches_competitor(filter, &r.domain));
            }
            render_trustpilot(&rows)
        }
        ReportKind::ReviewsGoogle => {
            let mut rows = if latest {
                rivalwatch_db::latest_google_reviews(pool).await?
            } else {
                rivalwatch_db::list_google_review_report(pool, filter).await?
            };
            if latest {
                rows.retain(|r| matches_competitor(filter, &r.domain));
            }
            render_google(&rows)
        }
        ReportKind::Competitors => render_competitors(&rivalwatch_db::list_competitors(pool).await?),
        ReportKind::Runs => render_runs(pool, &rivalwatch_db::list_scrape_runs(pool, limit).await?).await?,
    };

    print!("{rendered}");
    Ok(())
}

fn matches_competitor(filter: &ReportFilter, domain: &str) -> bool {
    filter.competitor.as_deref().is_none_or(|c| c == domain)
}

fn fmt_amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn fmt_count(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn fmt_offer(offered: bool, price: Option<f64>) -> String {
    match (offered, price) {
        (false, _) => "no".to_string(),
        (true, None) => "yes".to_string(),
        (true, Some(p)) => format!("yes {p:.2}"),
    }
}

fn render_prices(rows: &[PriceReportRow]) -> String {
    if rows.is_empty() {
        return "no prices found; run `run --task pricing` first\n".to_string();
    }

    let mut out = format!(
        "{:<12}{:<24}{:>10} {:<5}{:>9}  ADDONS\n",
        "DATE", "COMPETITOR", "PRICE", "CUR", "CHANGE"
    );
    for row in rows {
        let change = row
            .change()
            .map_or_else(|| "-".to_string(), |c| format!("{c:+.2}"));
        let _ = writeln!(
            out,
            "{:<12}{:<24}{:>10.2} {:<5}{:>9}  {}",
            row.scrape_date,
            row.domain,
            row.main_price,
            row.currency,
            change,
            row.addons.as_deref().unwrap_or("-")
        );
    }
    out
}

fn render_products(rows: &[ProductReportRow]) -> String {
    if rows.is_empty() {
        return "no product matrices found; run `run --task products` first\n".to_string();
    }

    let mut out = format!(
        "{:<12}{:<24}{:<13}{:<13}{:<13}VISA LETTER\n",
        "DATE", "COMPETITOR", "ONE WAY", "ROUND TRIP", "HOTEL"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12}{:<24}{:<13}{:<13}{:<13}{}",
            row.scrape_date,
            row.domain,
            fmt_offer(row.one_way_offered, row.one_way_price),
            fmt_offer(row.round_trip_offered, row.round_trip_price),
            fmt_offer(row.hotel_offered, row.hotel_price),
            fmt_offer(row.visa_letter_offered, row.visa_letter_price),
        );
    }
    out
}

fn render_diffs(rows: &[DiffReportRow]) -> String {
    if rows.is_empty() {
        return "no page changes recorded\n".to_string();
    }

    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{} {} {} snapshot {} -> {} (+{} / -{})",
            row.diff_date,
            row.domain,
            row.page_type,
            row.previous_snapshot_id,
            row.current_snapshot_id,
            row.additions_count,
            row.removals_count
        );
        let _ = writeln!(out, "{}\n", row.diff_text);
    }
    out
}

fn render_ab_tests(rows: &[AbTestReportRow]) -> String {
    if rows.is_empty() {
        return "no A/B-testing frameworks detected\n".to_string();
    }

    let mut out = format!(
        "{:<12}{:<24}{:<17}EVIDENCE\n",
        "DATE", "COMPETITOR", "TOOL"
    );
    for row in rows {
        let evidence = row.evidence.as_deref().unwrap_or("-");
        let evidence = if evidence.chars().count() > 60 {
            format!("{}...", evidence.chars().take(60).collect::<String>())
        } else {
            evidence.to_string()
        };
        let _ = writeln!(
            out,
            "{:<12}{:<24}{:<17}{}",
            row.scrape_date, row.domain, row.tool_name, evidence
        );
    }
    out
}

fn render_trustpilot(rows: &[TrustpilotReviewReportRow]) -> String {
    if rows.is_empty() {
        return "no Trustpilot reviews found\n".to_string();
    }

    let mut out = format!(
        "{:<12}{:<24}{:>7}{:>9}{:>8}{:>8}{:>8}{:>8}{:>8}\n",
        "DATE", "COMPETITOR", "RATING", "REVIEWS", "5*", "4*", "3*", "2*", "1*"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12}{:<24}{:>7}{:>9}{:>8}{:>8}{:>8}{:>8}{:>8}",
            row.scrape_date,
            row.domain,
            fmt_rating(row.overall_rating),
            fmt_count(row.review_count),
            fmt_count(row.stars_5),
            fmt_count(row.stars_4),
            fmt_count(row.stars_3),
            fmt_count(row.stars_2),
            fmt_count(row.stars_1),
        );
    }
    out
}

fn render_google(rows: &[GoogleReviewReportRow]) -> String {
    if rows.is_empty() {
        return "no Google reviews found\n".to_string();
    }

    let mut out = format!("{:<12}{:<24}{:>7}{:>9}\n", "DATE", "COMPETITOR", "RATING", "REVIEWS");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12}{:<24}{:>7}{:>9}",
            row.scrape_date,
            row.domain,
            fmt_rating(row.overall_rating),
            fmt_count(row.review_count),
        );
    }
    out
}

fn fmt_rating(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn render_competitors(rows: &[CompetitorRow]) -> String {
    if rows.is_empty() {
        return "no competitors stored; run `db seed` first\n".to_string();
    }

    let mut out = format!("{:<5}{:<24}BASE URL\n", "ID", "DOMAIN");
    for row in rows {
        let _ = writeln!(out, "{:<5}{:<24}{}", row.id, row.domain, row.base_url);
    }
    out
}

/// Recent runs, with the task breakdown of the newest one.
async fn render_runs(pool: &SqlitePool, runs: &[ScrapeRunRow]) -> anyhow::Result<String> {
    let Some(newest) = runs.first() else {
        return Ok("no scrape runs recorded\n".to_string());
    };

    let mut out = format!(
        "{:<6}{:<12}{:<10}{:<11}{:>6}  FINISHED\n",
        "RUN", "DATE", "TRIGGER", "STATUS", "ROWS"
    );
    for run in runs {
        let finished = run
            .completed_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        let _ = writeln!(
            out,
            "{:<6}{:<12}{:<10}{:<11}{:>6}  {}",
            run.id, run.run_date, run.trigger_source, run.status, run.rows_inserted, finished
        );
    }

    let tasks = rivalwatch_db::list_scrape_run_tasks(pool, newest.id).await?;
    if !tasks.is_empty() {
        let _ = writeln!(out, "\nrun {} tasks:", newest.id);
        for task in &tasks {
            let _ = writeln!(
                out,
                "  {:<20}{:<9}{:>6} rows {:>8} ms  {}",
                task.task_name,
                task.status,
                task.rows_inserted,
                task.duration_ms,
                task.error_message.as_deref().unwrap_or("")
            );
        }
    }
    Ok(out)
}
