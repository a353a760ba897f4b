//! Markup and embedded-JSON helpers shared by the extractors.
//!
//! Everything here is synchronous: callers parse a document, pull out what
//! they need, and drop the `Html` before the next `.await`.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Maximum nesting depth visited when walking embedded JSON payloads.
pub(crate) const MAX_JSON_DEPTH: usize = 15;

/// Elements whose text is never rendered.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

static JSONLD_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every text node in document order, script and style bodies included.
pub(crate) fn all_text_nodes(doc: &Html) -> impl Iterator<Item = &str> + '_ {
    doc.tree
        .nodes()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
}

/// Rendered text nodes, whitespace-collapsed, empty nodes dropped.
pub(crate) fn visible_text_nodes(doc: &Html) -> Vec<String> {
    doc.tree
        .nodes()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                return None;
            }
            let collapsed = collapse_whitespace(text);
            (!collapsed.is_empty()).then_some(collapsed)
        })
        .collect()
}

/// Rendered page text joined by single spaces.
pub(crate) fn visible_text(doc: &Html) -> String {
    visible_text_nodes(doc).join(" ")
}

/// Trimmed bodies of inline `<script>` elements.
pub(crate) fn script_texts(doc: &Html) -> Vec<String> {
    let selector = Selector::parse("script").expect("valid selector");
    doc.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// `src` attributes of `<script>` elements.
pub(crate) fn script_srcs(doc: &Html) -> Vec<String> {
    let selector = Selector::parse("script[src]").expect("valid selector");
    doc.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_owned)
        .collect()
}

/// Parsed `<script id="__NEXT_DATA__">` payload. Malformed JSON reads as absent.
pub(crate) fn next_data(doc: &Html) -> Option<Value> {
    let selector = Selector::parse("script#__NEXT_DATA__").expect("valid selector");
    let script = doc.select(&selector).next()?;
    let raw = script.text().collect::<String>();
    serde_json::from_str(raw.trim()).ok()
}

/// Top-level JSON-LD objects, with arrays flattened and `@graph` containers
/// expanded.
pub(crate) fn jsonld_objects(html: &str) -> Vec<Value> {
    let mut objects = Vec::new();

    for cap in JSONLD_SCRIPT_RE.captures_iter(html) {
        let Some(body) = cap.get(1) else { continue };
        let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) else {
            continue;
        };

        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        for item in items {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                objects.extend(graph.iter().filter(|g| g.is_object()).cloned());
            }
            if item.is_object() {
                objects.push(item);
            }
        }
    }

    objects
}

/// Calls `visit` for every JSON object reachable from `value`, stopping at
/// [`MAX_JSON_DEPTH`].
pub(crate) fn visit_objects(value: &Value, visit: &mut impl FnMut(&Map<String, Value>)) {
    visit_objects_at(value, 0, visit);
}

fn visit_objects_at(value: &Value, depth: usize, visit: &mut impl FnMut(&Map<String, Value>)) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            visit(map);
            for child in map.values() {
                visit_objects_at(child, depth + 1, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_objects_at(item, depth + 1, visit);
            }
        }
        _ => {}
    }
}

/// A JSON integer or a digit string (thousands separators allowed).
pub(crate) fn json_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

/// A JSON number or a numeric string.
pub(crate) fn json_rating(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses `"1,234"` as `1234`. Anything but digits and commas is rejected.
pub(crate) fn parse_count(raw: &str) -> Option<i64> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Slice of `text` from `before` characters ahead of byte offset `start` to
/// `after` characters past it. `start` must sit on a char boundary.
pub(crate) fn window(text: &str, start: usize, before: usize, after: usize) -> &str {
    let from = match before {
        0 => start,
        n => text[..start]
            .char_indices()
            .rev()
            .nth(n - 1)
            .map_or(0, |(i, _)| i),
    };
    let to = text[start..]
        .char_indices()
        .nth(after)
        .map_or(text.len(), |(i, _)| start + i);
    &text[from..to]
}
