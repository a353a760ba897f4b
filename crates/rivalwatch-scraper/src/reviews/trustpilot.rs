use std::sync::LazyLock;

use regex::Regex;
use rivalwatch_core::{ReviewSignal, ReviewSource, StarHistogram};
use serde_json::{Map, Value};

use super::{rating_summary, RatingSummary, ReviewPage};
use crate::client::{trustpilot_url, PageFetcher};
use crate::html;

const DISTRIBUTION_KEYS: [&str; 3] = ["reviewsDistribution", "ratingDistribution", "distribution"];

static SCRIPT_STAR_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""stars"\s*:\s*"?(?P<stars>[1-5])"?[^\n\r{}\[\]]{0,120}?"count"\s*:\s*(?P<count>\d[\d,]*)"#,
    )
    .expect("valid regex")
});

static TEXT_STAR_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<count>\d[\d,]*)\s+(?:reviews?|ratings?)\s+for\s+(?P<stars>[1-5])\s*[- ]?star")
        .expect("valid regex")
});

type HistogramStrategy = for<'p, 'a> fn(&'p ReviewPage<'a>) -> Option<StarHistogram>;

const HISTOGRAM_CHAIN: [HistogramStrategy; 3] = [
    histogram_from_next_data,
    histogram_from_scripts,
    histogram_from_text,
];

fn non_empty(histogram: StarHistogram) -> Option<StarHistogram> {
    (!histogram.is_empty()).then_some(histogram)
}

fn star_level(value: &Value) -> Option<u8> {
    html::json_count(value)
        .and_then(|stars| u8::try_from(stars).ok())
        .filter(|stars| (1..=5).contains(stars))
}

/// Lists of `{stars|star, count}` under the known distribution keys.
fn histogram_from_next_data(page: &ReviewPage<'_>) -> Option<StarHistogram> {
    let payload = html::next_data(&page.doc)?;
    let mut histogram = StarHistogram::default();

    html::visit_objects(&payload, &mut |map: &Map<String, Value>| {
        for key in DISTRIBUTION_KEYS {
            let Some(entries) = map.get(key).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let stars = entry
                    .get("stars")
                    .or_else(|| entry.get("star"))
                    .and_then(star_level);
                let count = entry.get("count").and_then(html::json_count);
                if let (Some(stars), Some(count)) = (stars, count) {
                    histogram.set(stars, count);
                }
            }
        }
    });

    non_empty(histogram)
}

/// `"stars": 5, ... "count": 812` pairs inside inline scripts.
fn histogram_from_scripts(page: &ReviewPage<'_>) -> Option<StarHistogram> {
    let mut histogram = StarHistogram::default();

    for script in html::script_texts(&page.doc) {
        if !script.to_lowercase().contains("star") {
            continue;
        }
        for caps in SCRIPT_STAR_COUNT_RE.captures_iter(&script) {
            let stars = caps["stars"].parse::<u8>().ok();
            let count = html::parse_count(&caps["count"]);
            if let (Some(stars), Some(count)) = (stars, count) {
                histogram.set(stars, count);
            }
        }
    }

    non_empty(histogram)
}

/// `812 reviews for 5-star` in the rendered text.
fn histogram_from_text(page: &ReviewPage<'_>) -> Option<StarHistogram> {
    let text = html::visible_text(&page.doc);
    let mut histogram = StarHistogram::default();

    for caps in TEXT_STAR_COUNT_RE.captures_iter(&text) {
        let stars = caps["stars"].parse::<u8>().ok();
        let count = html::parse_count(&caps["count"]);
        if let (Some(stars), Some(count)) = (stars, count) {
            histogram.set(stars, count);
        }
    }

    non_empty(histogram)
}

/// Star histogram from a Trustpilot page, first strategy with data wins.
#[must_use]
pub fn extract_star_histogram(body: &str) -> Option<StarHistogram> {
    let page = ReviewPage::parse(body);
    HISTOGRAM_CHAIN.iter().find_map(|strategy| strategy(&page))
}

/// Reads a Trustpilot page. `None` when it carries no rating, count or
/// histogram.
#[must_use]
pub fn extract_trustpilot_reviews(body: &str, source_url: &str) -> Option<ReviewSignal> {
    let page = ReviewPage::parse(body);
    let summary = rating_summary(&page).unwrap_or_default();
    let histogram = HISTOGRAM_CHAIN.iter().find_map(|strategy| strategy(&page));

    if summary == RatingSummary::default() && histogram.is_none() {
        return None;
    }

    Some(ReviewSignal {
        source: ReviewSource::Trustpilot,
        overall_rating: summary.rating,
        review_count: summary.count,
        histogram,
        source_url: source_url.to_string(),
    })
}

/// Fetches and reads the Trustpilot page for `domain`.
pub async fn scrape_trustpilot_reviews(
    fetcher: &PageFetcher,
    trustpilot_base: &str,
    domain: &str,
) -> Option<ReviewSignal> {
    let url = trustpilot_url(trustpilot_base, domain);
    let body = fetcher.fetch(&url).await?;
    extract_trustpilot_reviews(&body, &url)
}
