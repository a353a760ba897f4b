//! Main price and add-on extraction.
//!
//! Two strategies run per page. Pages that embed a `__NEXT_DATA__` payload are
//! read from that payload first; otherwise every text node carrying a currency
//! amount is a candidate, minus script noise. The lowest eligible amount is
//! taken as the main price. Sites that advertise a cheaper secondary product
//! will report that product instead; this is a known limitation of the
//! heuristic.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rivalwatch_core::{Addon, PriceSignal};
use scraper::Html;

use crate::client::{page_url, PageFetcher};
use crate::html;

/// Paths tried per competitor, in order. The empty path is the homepage.
pub const PRICING_PATHS: [&str; 5] = ["", "/pricing", "/prices", "/onward-ticket", "/product"];

/// Candidates containing any of these are inline script, not copy.
const NOISE_MARKERS: [&str; 7] = [
    "self.__next_f",
    "<![CDATA[",
    "gform.",
    "jQuery(",
    "__next_f",
    "window.__NEXT",
    "function(",
];

const MAX_CANDIDATE_CHARS: usize = 300;

pub(crate) static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:USD\s*)?(?P<currency>[$€£])(?P<amount>\d+(?:[.,]\d{1,2})?)")
        .expect("valid regex")
});

static ADDON_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>[^(+]+?)\s*\(\+\s*[$€£]?(?P<amount>\d+(?:[.,]\d{1,2})?)")
        .expect("valid regex")
});

static ADDON_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(\+\s*[$€£]?\d+(?:[.,]\d{1,2})?").expect("valid regex")
});

/// Which strategy produced a page's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStrategy {
    /// Read from the page's `__NEXT_DATA__` payload.
    StructuredPayload,
    /// Read from the page's text nodes.
    FreeText,
}

// ---------------------------------------------------------------------------
// Amount helpers
// ---------------------------------------------------------------------------

/// Parses `"16"`, `"16.50"` or `"16,50"`.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Maps a currency symbol or code to its ISO code.
#[must_use]
pub fn canonical_currency(symbol: &str) -> String {
    match symbol.trim() {
        "$" | "USD" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        other => other.to_uppercase(),
    }
}

fn captured_amount<'h>(caps: &Captures<'h>) -> Option<(f64, &'h str)> {
    let amount = parse_amount(caps.name("amount")?.as_str())?;
    let symbol = caps.name("currency")?.as_str();
    Some((amount, symbol))
}

/// First currency amount in `text`, with its ISO currency.
pub(crate) fn first_amount(text: &str) -> Option<(f64, String)> {
    let caps = PRICE_RE.captures(text)?;
    captured_amount(&caps).map(|(amount, symbol)| (amount, canonical_currency(symbol)))
}

fn is_noise(text: &str) -> bool {
    text.chars().count() > MAX_CANDIDATE_CHARS
        || NOISE_MARKERS.iter().any(|marker| text.contains(marker))
}

fn is_addon_delta(text: &str) -> bool {
    ADDON_ONLY_RE.is_match(text) || text.contains("(+")
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Reads prices from the `__NEXT_DATA__` payload.
///
/// Every distinct amount found in the serialized payload is collected in
/// order. The smallest becomes the main price; the rest become add-ons.
fn from_next_data(doc: &Html, source_url: &str) -> Option<PriceSignal> {
    let payload = html::next_data(doc)?;
    let blob = payload.to_string();

    let mut amounts: Vec<(f64, &str)> = Vec::new();
    for caps in PRICE_RE.captures_iter(&blob) {
        let Some((amount, symbol)) = captured_amount(&caps) else {
            continue;
        };
        if amounts.iter().any(|(seen, _)| seen.to_bits() == amount.to_bits()) {
            continue;
        }
        amounts.push((amount, symbol));
    }

    let (main_price, main_symbol) = amounts
        .iter()
        .copied()
        .reduce(|best, next| if next.0 < best.0 { next } else { best })?;

    let addons = amounts
        .iter()
        .filter(|(amount, _)| amount.to_bits() != main_price.to_bits())
        .map(|(amount, symbol)| Addon {
            name: format!("Addon {symbol}{amount:.2}"),
            price: *amount,
        })
        .collect();

    Some(PriceSignal {
        main_price,
        currency: canonical_currency(main_symbol),
        addons,
        source_url: source_url.to_string(),
    })
}

/// Reads prices from the page's text nodes.
fn from_text(doc: &Html, source_url: &str) -> Option<PriceSignal> {
    let candidates: Vec<String> = html::all_text_nodes(doc)
        .filter(|text| PRICE_RE.is_match(text))
        .map(html::collapse_whitespace)
        .filter(|text| !is_noise(text))
        .collect();

    let mut best: Option<(f64, String)> = None;
    for candidate in &candidates {
        if is_addon_delta(candidate) {
            continue;
        }
        let Some((amount, currency)) = first_amount(candidate) else {
            continue;
        };
        if best.as_ref().is_none_or(|(price, _)| amount < *price) {
            best = Some((amount, currency));
        }
    }
    let (main_price, currency) = best?;

    Some(PriceSignal {
        main_price,
        currency,
        addons: extract_addons(&candidates),
        source_url: source_url.to_string(),
    })
}

/// Collects `Label (+$7)` add-ons, unique by case-insensitive label.
fn extract_addons(candidates: &[String]) -> Vec<Addon> {
    let mut addons: Vec<Addon> = Vec::new();

    for candidate in candidates {
        for caps in ADDON_INLINE_RE.captures_iter(candidate) {
            let name = caps["name"].trim().trim_end_matches('(').trim();
            let Some(price) = parse_amount(&caps["amount"]) else {
                continue;
            };
            if name.is_empty() || price <= 0.0 {
                continue;
            }
            let key = name.to_lowercase();
            if addons.iter().any(|a| a.name.to_lowercase() == key) {
                continue;
            }
            addons.push(Addon {
                name: name.to_string(),
                price,
            });
        }
    }

    addons
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extracts a price from one page, trying the structured payload first.
#[must_use]
pub fn extract_page_price(body: &str, source_url: &str) -> Option<(PriceSignal, PriceStrategy)> {
    let doc = Html::parse_document(body);
    if let Some(signal) = from_next_data(&doc, source_url) {
        return Some((signal, PriceStrategy::StructuredPayload));
    }
    from_text(&doc, source_url).map(|signal| (signal, PriceStrategy::FreeText))
}

/// Walks [`PRICING_PATHS`] for one competitor and returns the best price.
///
/// A structured-payload hit ends the search. Free-text hits keep the lowest
/// price seen, and a homepage hit ends the search. Unavailable pages are
/// skipped.
pub async fn scrape_pricing(fetcher: &PageFetcher, base_url: &str) -> Option<PriceSignal> {
    let mut best: Option<PriceSignal> = None;

    for (i, path) in PRICING_PATHS.iter().enumerate() {
        if i > 0 {
            fetcher.pause().await;
        }
        let url = page_url(base_url, path);
        let Some(body) = fetcher.fetch(&url).await else {
            continue;
        };
        let Some((signal, strategy)) = extract_page_price(&body, &url) else {
            tracing::debug!(url = %url, "no price on page");
            continue;
        };

        tracing::debug!(url = %url, price = signal.main_price, ?strategy, "price candidate");
        match strategy {
            PriceStrategy::StructuredPayload => return Some(signal),
            PriceStrategy::FreeText => {
                if best
                    .as_ref()
                    .is_none_or(|current| signal.main_price < current.main_price)
                {
                    best = Some(signal);
                }
                if path.is_empty() {
                    break;
                }
            }
        }
    }

    best
}

#[cfg(test)]
#[path = "pricing_test.rs"]
mod tests;
