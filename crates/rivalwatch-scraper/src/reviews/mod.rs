//! Review summaries from Trustpilot and Google search result pages.
//!
//! Both sources share one rating/count chain; Trustpilot pages additionally
//! carry a star histogram.

mod google;
mod trustpilot;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::html;

pub use google::{extract_google_reviews, scrape_google_reviews};
pub use trustpilot::{extract_star_histogram, extract_trustpilot_reviews, scrape_trustpilot_reviews};

static RATING_THEN_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<rating>\d(?:\.\d)?)\s*(?:out of 5|stars?)\s*(?:from|based on)?\s*(?P<count>\d[\d,]*)\s*(?:reviews?|ratings?)",
    )
    .expect("valid regex")
});

static COUNT_THEN_RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<count>\d[\d,]*)\s*(?:Google\s+)?(?:reviews?|ratings?)\s*(?:with\s+an\s+average\s+of\s+)?(?P<rating>\d(?:\.\d)?)",
    )
    .expect("valid regex")
});

/// Overall rating and review count. At least one is present whenever a
/// strategy reports success.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub rating: Option<f64>,
    pub count: Option<i64>,
}

impl RatingSummary {
    fn found(self) -> Option<Self> {
        (self.rating.is_some() || self.count.is_some()).then_some(self)
    }
}

/// A fetched review page, parsed once and shared by every strategy.
pub(crate) struct ReviewPage<'a> {
    raw: &'a str,
    doc: Html,
}

impl<'a> ReviewPage<'a> {
    pub(crate) fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            doc: Html::parse_document(raw),
        }
    }
}

type SummaryStrategy = for<'p, 'a> fn(&'p ReviewPage<'a>) -> Option<RatingSummary>;

const SUMMARY_CHAIN: [(&str, SummaryStrategy); 4] = [
    ("json-ld", from_jsonld),
    ("next-data", from_next_data),
    ("microdata", from_microdata),
    ("text", from_text),
];

/// Runs the rating/count chain; the first strategy that finds a rating or a
/// count wins.
pub(crate) fn rating_summary(page: &ReviewPage<'_>) -> Option<RatingSummary> {
    SUMMARY_CHAIN.iter().find_map(|(name, strategy)| {
        let summary = strategy(page)?;
        tracing::debug!(strategy = *name, ?summary, "review summary found");
        Some(summary)
    })
}

/// Runs the rating/count chain over raw markup.
#[must_use]
pub fn extract_rating_summary(body: &str) -> Option<RatingSummary> {
    rating_summary(&ReviewPage::parse(body))
}

fn summary_from_aggregate(value: &Value) -> Option<RatingSummary> {
    RatingSummary {
        rating: value.get("ratingValue").and_then(html::json_rating),
        count: value.get("reviewCount").and_then(html::json_count),
    }
    .found()
}

/// schema.org `aggregateRating` blocks or bare `AggregateRating` objects.
fn from_jsonld(page: &ReviewPage<'_>) -> Option<RatingSummary> {
    html::jsonld_objects(page.raw).iter().find_map(|item| {
        if let Some(aggregate) = item.get("aggregateRating").filter(|a| a.is_object()) {
            return summary_from_aggregate(aggregate);
        }
        if item.get("@type").and_then(Value::as_str) == Some("AggregateRating") {
            return summary_from_aggregate(item);
        }
        None
    })
}

/// `trustScore` / `numberOfReviews` anywhere in the `__NEXT_DATA__` payload.
fn from_next_data(page: &ReviewPage<'_>) -> Option<RatingSummary> {
    let payload = html::next_data(&page.doc)?;
    let mut summary = RatingSummary::default();

    html::visit_objects(&payload, &mut |map: &serde_json::Map<String, Value>| {
        if summary.rating.is_none() {
            if let Some(score) = map.get("trustScore") {
                summary.rating = html::json_rating(score);
            }
        }
        if summary.count.is_none() {
            if let Some(reviews) = map.get("numberOfReviews") {
                summary.count = match reviews {
                    Value::Object(inner) => inner.get("total").and_then(html::json_count),
                    other => html::json_count(other),
                };
            }
        }
    });

    summary.found()
}

/// `itemprop="ratingValue"` / `itemprop="reviewCount"` markup.
fn from_microdata(page: &ReviewPage<'_>) -> Option<RatingSummary> {
    let itemprop = |name: &str| -> Option<String> {
        let selector =
            Selector::parse(&format!(r#"[itemprop="{name}"]"#)).expect("valid selector");
        let el = page.doc.select(&selector).next()?;
        let text = el.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            el.value().attr("content").map(str::to_owned)
        } else {
            Some(text.to_owned())
        }
    };

    RatingSummary {
        rating: itemprop("ratingValue").and_then(|v| v.trim().parse().ok()),
        count: itemprop("reviewCount").and_then(|v| html::parse_count(&v)),
    }
    .found()
}

/// `4.6 out of 5 based on 1,234 reviews` and `1,234 Google reviews 4.6`.
fn from_text(page: &ReviewPage<'_>) -> Option<RatingSummary> {
    let text = html::visible_text(&page.doc);

    [&*RATING_THEN_COUNT_RE, &*COUNT_THEN_RATING_RE]
        .iter()
        .find_map(|re| {
            let caps = re.captures(&text)?;
            RatingSummary {
                rating: caps["rating"].parse().ok(),
                count: html::parse_count(&caps["count"]),
            }
            .found()
        })
}
