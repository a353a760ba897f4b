//! Product-category detection across a competitor's landing pages.

use rivalwatch_core::{ProductCategory, ProductSignal};
use scraper::Html;

use crate::client::{page_url, PageFetcher};
use crate::html;
use crate::pricing::first_amount;

/// Paths fetched per competitor. Every page that loads is analysed.
pub const PRODUCT_PATHS: [&str; 5] = ["", "/pricing", "/products", "/services", "/onward-ticket"];

const PRICE_WINDOW_BEFORE: usize = 50;
const PRICE_WINDOW_AFTER: usize = 200;

struct CategoryRule {
    category: ProductCategory,
    /// Any of these in the page text marks the category as offered.
    keywords: &'static [&'static str],
    /// Tried in order when looking for a nearby price.
    anchors: &'static [&'static str],
}

const RULES: [CategoryRule; 4] = [
    CategoryRule {
        category: ProductCategory::OneWay,
        keywords: &[
            "one-way",
            "one way",
            "onward ticket",
            "dummy ticket",
            "flight reservation",
        ],
        anchors: &["one-way", "one way", "onward ticket", "dummy ticket"],
    },
    CategoryRule {
        category: ProductCategory::RoundTrip,
        keywords: &["round trip", "round-trip", "return", "two-way", "two way"],
        anchors: &["round trip", "round-trip", "return"],
    },
    CategoryRule {
        category: ProductCategory::Hotel,
        keywords: &["hotel", "accommodation", "hostel"],
        anchors: &["hotel", "accommodation", "hostel"],
    },
    CategoryRule {
        category: ProductCategory::VisaLetter,
        keywords: &["visa", "support letter", "invitation letter"],
        anchors: &["visa", "support letter", "invitation letter"],
    },
];

/// First currency amount near the first occurrence of `anchor`.
fn price_near(page_lower: &str, anchor: &str) -> Option<f64> {
    let start = page_lower.find(anchor)?;
    let snippet = html::window(page_lower, start, PRICE_WINDOW_BEFORE, PRICE_WINDOW_AFTER);
    first_amount(snippet).map(|(amount, _)| amount)
}

/// Folds one page's evidence into `signal`.
///
/// `offered` flags are OR-merged. A category's price is looked up only on the
/// first page that mentions it; later pages never fill it in.
pub fn merge_page(signal: &mut ProductSignal, body: &str) {
    let page_lower = {
        let doc = Html::parse_document(body);
        html::visible_text(&doc).to_lowercase()
    };

    for rule in &RULES {
        let offer = signal.offer_mut(rule.category);
        if offer.offered || !rule.keywords.iter().any(|kw| page_lower.contains(kw)) {
            continue;
        }
        offer.offered = true;
        offer.price = rule
            .anchors
            .iter()
            .find_map(|anchor| price_near(&page_lower, anchor));
    }
}

/// Merges every `(url, body)` page into one record. `None` when no page
/// could be fetched.
#[must_use]
pub fn extract_products(pages: &[(String, String)]) -> Option<ProductSignal> {
    let (first_url, _) = pages.first()?;
    let mut signal = ProductSignal::empty(first_url.clone());
    for (_, body) in pages {
        merge_page(&mut signal, body);
    }
    Some(signal)
}

/// Fetches [`PRODUCT_PATHS`] for one competitor and merges what loads.
pub async fn scrape_products(fetcher: &PageFetcher, base_url: &str) -> Option<ProductSignal> {
    let mut pages = Vec::new();

    for (i, path) in PRODUCT_PATHS.iter().enumerate() {
        if i > 0 {
            fetcher.pause().await;
        }
        let url = page_url(base_url, path);
        if let Some(body) = fetcher.fetch(&url).await {
            pages.push((url, body));
        }
    }

    tracing::debug!(base_url, pages = pages.len(), "product pages fetched");
    extract_products(&pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> (String, String) {
        (url.to_string(), body.to_string())
    }

    #[test]
    fn detects_categories_and_nearby_prices() {
        let pages = vec![page(
            "https://dummyticket.com",
            "<h2>One-Way Flight Reservation</h2><p>Only $15 per passenger</p>\
             <p>Delivered instantly by email and accepted at airline check-in desks.</p>\
             <h2>Hotel Booking</h2><p>From $10</p>",
        )];
        let signal = extract_products(&pages).expect("record");

        assert!(signal.one_way.offered);
        assert_eq!(signal.one_way.price, Some(15.0));
        assert!(signal.hotel.offered);
        assert_eq!(signal.hotel.price, Some(10.0));
        assert!(!signal.round_trip.offered);
        assert_eq!(signal.round_trip.price, None);
        assert!(!signal.visa_letter.offered);
        assert_eq!(signal.source_url, "https://dummyticket.com");
    }

    #[test]
    fn offered_flags_merge_across_pages() {
        let pages = vec![
            page("https://vizafly.com", "<p>Round trip tickets</p>"),
            page(
                "https://vizafly.com/services",
                "<p>Visa support letter available for $25</p>",
            ),
        ];
        let signal = extract_products(&pages).expect("record");

        assert!(signal.round_trip.offered);
        assert_eq!(signal.round_trip.price, None);
        assert!(signal.visa_letter.offered);
        assert_eq!(signal.visa_letter.price, Some(25.0));
        assert_eq!(signal.source_url, "https://vizafly.com");
    }

    #[test]
    fn price_comes_only_from_the_first_page_mentioning_a_category() {
        let pages = vec![
            page("https://a.example", "<p>Onward ticket service</p>"),
            page("https://a.example/pricing", "<p>Onward ticket $12</p>"),
            page("https://a.example/hotels", "<p>Hotel rooms from $30</p>"),
        ];
        let signal = extract_products(&pages).expect("record");

        assert!(signal.one_way.offered);
        assert_eq!(signal.one_way.price, None);
        assert!(signal.hotel.offered);
        assert_eq!(signal.hotel.price, Some(30.0));
    }

    #[test]
    fn price_window_is_measured_in_characters() {
        let pages = vec![page(
            "https://a.example",
            &format!("<p>one way {} $12</p>", "é".repeat(100)),
        )];
        let signal = extract_products(&pages).expect("record");
        assert_eq!(signal.one_way.price, Some(12.0));
    }

    #[test]
    fn script_text_is_not_page_copy() {
        let pages = vec![page(
            "https://a.example",
            "<script>var label = 'hotel';</script><p>Flights only</p>",
        )];
        let signal = extract_products(&pages).expect("record");
        assert!(!signal.hotel.offered);
    }

    #[test]
    fn no_pages_means_no_record() {
        assert!(extract_products(&[]).is_none());
    }

    #[test]
    fn empty_pages_still_produce_a_record() {
        let pages = vec![page("https://a.example", "<p>Nothing relevant</p>")];
        let signal = extract_products(&pages).expect("record");
        for category in ProductCategory::ALL {
            assert!(!signal.offer(category).offered);
        }
    }
}
