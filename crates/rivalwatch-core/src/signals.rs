//! Typed signal records produced by the extractors and persisted by the
//! storage layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps fixed once at the start of a run and shared by every record the
/// run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub scrape_date: NaiveDate,
    pub scraped_at: DateTime<Utc>,
}

impl RunContext {
    #[must_use]
    pub fn at(scraped_at: DateTime<Utc>) -> Self {
        Self {
            scrape_date: scraped_at.date_naive(),
            scraped_at,
        }
    }

    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// A priced extra shown next to the main offer, e.g. `Round Trip (+$7)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSignal {
    pub main_price: f64,
    /// ISO 4217 code, e.g. `"USD"`.
    pub currency: String,
    /// Ordered by first appearance on the page.
    pub addons: Vec<Addon>,
    pub source_url: String,
}

/// The fixed product categories tracked for every competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductCategory {
    OneWay,
    RoundTrip,
    Hotel,
    VisaLetter,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 4] = [
        ProductCategory::OneWay,
        ProductCategory::RoundTrip,
        ProductCategory::Hotel,
        ProductCategory::VisaLetter,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductCategory::OneWay => "one_way",
            ProductCategory::RoundTrip => "round_trip",
            ProductCategory::Hotel => "hotel",
            ProductCategory::VisaLetter => "visa_letter",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProductOffer {
    pub offered: bool,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSignal {
    pub one_way: ProductOffer,
    pub round_trip: ProductOffer,
    pub hotel: ProductOffer,
    pub visa_letter: ProductOffer,
    /// First page that could be fetched for the competitor.
    pub source_url: String,
}

impl ProductSignal {
    #[must_use]
    pub fn empty(source_url: impl Into<String>) -> Self {
        Self {
            one_way: ProductOffer::default(),
            round_trip: ProductOffer::default(),
            hotel: ProductOffer::default(),
            visa_letter: ProductOffer::default(),
            source_url: source_url.into(),
        }
    }

    #[must_use]
    pub fn offer(&self, category: ProductCategory) -> ProductOffer {
        match category {
            ProductCategory::OneWay => self.one_way,
            ProductCategory::RoundTrip => self.round_trip,
            ProductCategory::Hotel => self.hotel,
            ProductCategory::VisaLetter => self.visa_letter,
        }
    }

    pub fn offer_mut(&mut self, category: ProductCategory) -> &mut ProductOffer {
        match category {
            ProductCategory::OneWay => &mut self.one_way,
            ProductCategory::RoundTrip => &mut self.round_trip,
            ProductCategory::Hotel => &mut self.hotel,
            ProductCategory::VisaLetter => &mut self.visa_letter,
        }
    }
}

/// Review counts per star level; index 0 holds 1-star reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StarHistogram {
    pub counts: [Option<i64>; 5],
}

impl StarHistogram {
    /// Count for `stars` (1-5). Out-of-range levels read as `None`.
    #[must_use]
    pub fn get(&self, stars: u8) -> Option<i64> {
        match stars {
            1..=5 => self.counts[usize::from(stars - 1)],
            _ => None,
        }
    }

    /// Records `count` for `stars`; out-of-range levels are ignored.
    pub fn set(&mut self, stars: u8, count: i64) {
        if let 1..=5 = stars {
            self.counts[usize::from(stars - 1)] = Some(count);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSource {
    Trustpilot,
    Google,
}

impl ReviewSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewSource::Trustpilot => "trustpilot",
            ReviewSource::Google => "google",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSignal {
    pub source: ReviewSource,
    pub overall_rating: Option<f64>,
    pub review_count: Option<i64>,
    /// Only populated for Trustpilot.
    pub histogram: Option<StarHistogram>,
    pub source_url: String,
}

/// One A/B-testing framework found in a page's markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbTestDetection {
    /// Stable identifier from the signature table, e.g. `"optimizely"`.
    pub tool_name: String,
    /// Whitespace-collapsed context around the matched signature.
    pub evidence: String,
}

/// Pages captured by the snapshot engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Homepage,
    Pricing,
}

impl PageType {
    pub const ALL: [PageType; 2] = [PageType::Homepage, PageType::Pricing];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Homepage => "homepage",
            PageType::Pricing => "pricing",
        }
    }

    /// Path appended to the competitor's base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            PageType::Homepage => "",
            PageType::Pricing => "/pricing",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn run_context_derives_date_from_instant() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 1).unwrap();
        let ctx = RunContext::at(at);
        assert_eq!(ctx.scrape_date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        assert_eq!(ctx.scraped_at, at);
    }

    #[test]
    fn histogram_ignores_out_of_range_levels() {
        let mut h = StarHistogram::default();
        assert!(h.is_empty());
        h.set(5, 120);
        h.set(0, 9);
        h.set(6, 9);
        assert_eq!(h.get(5), Some(120));
        assert_eq!(h.get(0), None);
        assert_eq!(h.counts.iter().flatten().count(), 1);
    }

    #[test]
    fn product_signal_offer_mut_targets_category() {
        let mut signal = ProductSignal::empty("https://example.com");
        signal.offer_mut(ProductCategory::Hotel).offered = true;
        assert!(signal.offer(ProductCategory::Hotel).offered);
        assert!(!signal.offer(ProductCategory::OneWay).offered);
    }

    #[test]
    fn addon_serializes_as_name_price_object() {
        let addon = Addon {
            name: "Round Trip".to_string(),
            price: 7.0,
        };
        let json = serde_json::to_string(&addon).unwrap();
        assert_eq!(json, r#"{"name":"Round Trip","price":7.0}"#);
    }

    #[test]
    fn page_type_paths() {
        assert_eq!(PageType::Homepage.path(), "");
        assert_eq!(PageType::Pricing.path(), "/pricing");
        assert_eq!(PageType::Pricing.to_string(), "pricing");
    }
}
