//! Per-competitor work for each task: scrape, then write through the
//! competitor's transaction.

use rivalwatch_core::PageType;
use rivalwatch_db::{CompetitorRow, DbError, NewDiff, NewSnapshot};
use rivalwatch_scraper::{
    content_hash, detect_ab_tests, diff_snapshots, page_url, scrape_google_reviews, scrape_pricing,
    scrape_products, scrape_trustpilot_reviews,
};
use sqlx::SqliteConnection;

use super::{Collector, TaskKind};

/// Returns `true` when the competitor produced data for `task`.
pub(super) async fn collect_competitor(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    task: TaskKind,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    match task {
        TaskKind::Pricing => collect_pricing(collector, conn, competitor).await,
        TaskKind::Products => collect_products(collector, conn, competitor).await,
        TaskKind::Snapshots => collect_snapshots(collector, conn, competitor).await,
        TaskKind::ReviewsTrustpilot | TaskKind::ReviewsGoogle => {
            collect_reviews(collector, conn, task, competitor).await
        }
        TaskKind::AbTests => collect_ab_tests(collector, conn, competitor).await,
    }
}

async fn collect_pricing(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    let Some(signal) = scrape_pricing(collector.fetcher, &competitor.base_url).await else {
        tracing::warn!(competitor = %competitor.domain, "no price found on any candidate page");
        return Ok(false);
    };

    rivalwatch_db::upsert_price(conn, competitor.id, &collector.ctx, &signal).await?;
    tracing::info!(
        competitor = %competitor.domain,
        price = signal.main_price,
        currency = %signal.currency,
        addons = signal.addons.len(),
        url = %signal.source_url,
        "price stored"
    );
    Ok(true)
}

async fn collect_products(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    let Some(signal) = scrape_products(collector.fetcher, &competitor.base_url).await else {
        tracing::warn!(competitor = %competitor.domain, "no product page could be fetched");
        return Ok(false);
    };

    rivalwatch_db::upsert_product(conn, competitor.id, &collector.ctx, &signal).await?;
    tracing::info!(
        competitor = %competitor.domain,
        one_way = signal.one_way.offered,
        round_trip = signal.round_trip.offered,
        hotel = signal.hotel.offered,
        visa_letter = signal.visa_letter.offered,
        "product matrix stored"
    );
    Ok(true)
}

/// Captures every tracked page type and diffs it against the capture before.
async fn collect_snapshots(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    let mut captured = false;

    for (i, page_type) in PageType::ALL.into_iter().enumerate() {
        if i > 0 {
            collector.fetcher.pause().await;
        }
        let url = page_url(&competitor.base_url, page_type.path());
        let Some(body) = collector.fetcher.fetch(&url).await else {
            continue;
        };

        let hash = content_hash(&body);
        let snapshot_id = rivalwatch_db::insert_snapshot(
            conn,
            &collector.ctx,
            &NewSnapshot {
                competitor_id: competitor.id,
                page_type,
                page_url: &url,
                html_content: &body,
                content_hash: &hash,
            },
        )
        .await?;
        captured = true;

        let Some(previous) =
            rivalwatch_db::get_previous_snapshot(conn, competitor.id, page_type, snapshot_id)
                .await?
        else {
            tracing::debug!(competitor = %competitor.domain, %page_type, "first snapshot");
            continue;
        };
        let Some(diff) = diff_snapshots(previous.id, &previous.html_content, snapshot_id, &body)
        else {
            continue;
        };

        rivalwatch_db::insert_diff(
            conn,
            &collector.ctx,
            &NewDiff {
                competitor_id: competitor.id,
                page_type,
                previous_snapshot_id: previous.id,
                current_snapshot_id: snapshot_id,
                diff_text: &diff.text,
                additions_count: i64::try_from(diff.additions).unwrap_or(i64::MAX),
                removals_count: i64::try_from(diff.removals).unwrap_or(i64::MAX),
            },
        )
        .await?;
        tracing::info!(
            competitor = %competitor.domain,
            %page_type,
            additions = diff.additions,
            removals = diff.removals,
            "page changed"
        );
    }

    Ok(captured)
}

async fn collect_reviews(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    task: TaskKind,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    let signal = if task == TaskKind::ReviewsTrustpilot {
        scrape_trustpilot_reviews(
            collector.fetcher,
            collector.trustpilot_base_url,
            &competitor.domain,
        )
        .await
    } else {
        scrape_google_reviews(collector.fetcher, collector.google_search_url, &competitor.domain)
            .await
    };
    let Some(signal) = signal else {
        return Ok(false);
    };

    rivalwatch_db::insert_review(conn, competitor.id, &collector.ctx, &signal).await?;
    tracing::info!(
        competitor = %competitor.domain,
        source = signal.source.as_str(),
        rating = ?signal.overall_rating,
        count = ?signal.review_count,
        "review summary stored"
    );
    Ok(true)
}

/// Scans the homepage. A fetched page counts as data even with no detections.
async fn collect_ab_tests(
    collector: &Collector<'_>,
    conn: &mut SqliteConnection,
    competitor: &CompetitorRow,
) -> Result<bool, DbError> {
    let url = page_url(&competitor.base_url, PageType::Homepage.path());
    let Some(body) = collector.fetcher.fetch(&url).await else {
        return Ok(false);
    };

    let detections = detect_ab_tests(&body);
    let stored = rivalwatch_db::insert_ab_test_detections(
        conn,
        competitor.id,
        &collector.ctx,
        &url,
        &detections,
    )
    .await?;
    tracing::info!(competitor = %competitor.domain, detections = stored, "A/B framework scan complete");
    Ok(true)
}
