use rivalwatch_core::{ReviewSignal, ReviewSource};

use super::{rating_summary, ReviewPage};
use crate::client::{google_search_url, PageFetcher};

/// Reads a Google search results page. `None` when neither a rating nor a
/// count is present.
#[must_use]
pub fn extract_google_reviews(body: &str, source_url: &str) -> Option<ReviewSignal> {
    let summary = rating_summary(&ReviewPage::parse(body))?;
    Some(ReviewSignal {
        source: ReviewSource::Google,
        overall_rating: summary.rating,
        review_count: summary.count,
        histogram: None,
        source_url: source_url.to_string(),
    })
}

/// Searches Google for `domain` and reads the result page.
pub async fn scrape_google_reviews(
    fetcher: &PageFetcher,
    search_base: &str,
    domain: &str,
) -> Option<ReviewSignal> {
    let url = google_search_url(search_base, domain);
    let body = fetcher.fetch(&url).await?;
    extract_google_reviews(&body, &url)
}
