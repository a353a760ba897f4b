pub mod client;
pub mod error;
mod html;
pub mod pricing;
pub mod products;
pub mod reviews;
pub mod snapshot;

pub use ab_tests::{detect_ab_tests, AB_TEST_SIGNATURES};
pub use client::{google_search_url, page_url, trustpilot_url, PageFetcher, USER_AGENTS};
pub use error::ScraperError;
pub use pricing::{extract_page_price, scrape_pricing, PriceStrategy, PRICING_PATHS};
pub use products::{extract_products, scrape_products, PRODUCT_PATHS};
pub use reviews::{
    extract_google_reviews, extract_rating_summary, extract_star_histogram,
    extract_trustpilot_reviews, scrape_google_reviews, scrape_trustpilot_reviews, RatingSummary,
};
pub use snapshot::{content_hash, diff_snapshots, normalize_for_diff, SnapshotDiff};
