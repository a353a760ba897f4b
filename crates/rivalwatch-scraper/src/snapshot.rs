//! Page snapshots: content hashing, normalization and line diffs.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use sha2::{Digest, Sha256};
use similar::{ChangeTag, TextDiff};

use crate::html;

const CONTEXT_LINES: usize = 3;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\d{4}-\d{2}-\d{2}[T\s]\d{2}:\d{2}(?::\d{2})?(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)|(?:\b\d{1,2}:\d{2}(?::\d{2})?\s?(?:AM|PM|UTC)?\b)",
    )
    .expect("valid regex")
});

/// A non-empty change between two snapshots of the same page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Unified diff with `snapshot:<id>` file headers.
    pub text: String,
    pub additions: usize,
    pub removals: usize,
}

/// Lowercase hex SHA-256 of the raw markup.
#[must_use]
pub fn content_hash(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

/// Visible text lines with clock and date-time values masked.
#[must_use]
pub fn normalize_for_diff(body: &str) -> Vec<String> {
    let masked = TIMESTAMP_RE.replace_all(body, "[TIMESTAMP]");
    let doc = Html::parse_document(&masked);
    html::visible_text_nodes(&doc)
}

/// Diffs two snapshots' normalized text. `None` when nothing visible changed.
#[must_use]
pub fn diff_snapshots(
    previous_id: i64,
    previous_body: &str,
    current_id: i64,
    current_body: &str,
) -> Option<SnapshotDiff> {
    let old_lines = normalize_for_diff(previous_body);
    let new_lines = normalize_for_diff(current_body);
    let old_refs: Vec<&str> = old_lines.iter().map(String::as_str).collect();
    let new_refs: Vec<&str> = new_lines.iter().map(String::as_str).collect();

    let diff = TextDiff::from_slices(old_refs.as_slice(), new_refs.as_slice());

    let (mut additions, mut removals) = (0usize, 0usize);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => additions += 1,
            ChangeTag::Delete => removals += 1,
            ChangeTag::Equal => {}
        }
    }
    if additions + removals == 0 {
        return None;
    }

    let text = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(
            &format!("snapshot:{previous_id}"),
            &format!("snapshot:{current_id}"),
        )
        .to_string();

    Some(SnapshotDiff {
        text: text.trim_end_matches('\n').to_string(),
        additions,
        removals,
    })
}
