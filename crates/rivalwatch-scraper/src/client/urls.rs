//! URL construction for competitor pages and review sources.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped in a form-encoded query value. Spaces are
/// handled separately and become `+`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b' ');

/// Joins a competitor base URL and a page path.
///
/// `("https://example.com/", "/pricing")` yields `https://example.com/pricing`;
/// an empty path yields the base URL without its trailing slash.
#[must_use]
pub fn page_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

/// Trustpilot review page for `domain`.
#[must_use]
pub fn trustpilot_url(trustpilot_base: &str, domain: &str) -> String {
    format!("{}/{domain}", trustpilot_base.trim_end_matches('/'))
}

/// Google search URL querying for `domain`, form-encoded.
#[must_use]
pub fn google_search_url(search_base: &str, domain: &str) -> String {
    let encoded = utf8_percent_encode(domain, QUERY_VALUE)
        .to_string()
        .replace(' ', "+");
    format!("{search_base}?q={encoded}")
}
