//! Source records returned to callers.

use super::engine::RawSource;
use serde::{Deserialize, Serialize};

/// Snippets longer than this many characters are truncated.
pub const SNIPPET_MAX_CHARS: usize = 200;
/// Appended to truncated snippets.
pub const ELLIPSIS: &str = "...";

/// A cited source: title, link, and a short excerpt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SourceRecord {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

impl From<RawSource> for SourceRecord {
    fn from(raw: RawSource) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.url.unwrap_or_default(),
            snippet: raw.snippet.as_deref().map(truncate_snippet).unwrap_or_default(),
        }
    }
}

/// Truncate to [`SNIPPET_MAX_CHARS`] characters plus [`ELLIPSIS`]; shorter text passes through.
pub fn truncate_snippet(snippet: &str) -> String {
    match snippet.char_indices().nth(SNIPPET_MAX_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &snippet[..cut]),
        None => snippet.to_string(),
    }
}

/// Convert engine sources in order, keeping at most `limit`.
pub fn collect_sources(raw: Option<Vec<RawSource>>, limit: usize) -> Vec<SourceRecord> {
    raw.unwrap_or_default()
        .into_iter()
        .take(limit)
        .map(SourceRecord::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_snippet_unchanged() {
        assert_eq!(truncate_snippet("short"), "short");
        let exact = "x".repeat(SNIPPET_MAX_CHARS);
        assert_eq!(truncate_snippet(&exact), exact);
    }

    #[test]
    fn test_long_snippet_truncated() {
        let long = "y".repeat(SNIPPET_MAX_CHARS + 1);
        let out = truncate_snippet(&long);
        assert_eq!(out.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let long = "é".repeat(250);
        let out = truncate_snippet(&long);
        assert_eq!(out.chars().count(), 203);
        assert!(out.starts_with(&"é".repeat(200)));
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let record = SourceRecord::from(RawSource::default());
        assert_eq!(record, SourceRecord::default());
    }

    #[test]
    fn test_collect_caps_and_keeps_order() {
        let raw: Vec<RawSource> = (0..8)
            .map(|i| RawSource::new(format!("t{i}"), format!("https://s{i}.org"), "s"))
            .collect();
        let records = collect_sources(Some(raw), 5);
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].title, "t0");
        assert_eq!(records[4].title, "t4");
    }

    #[test]
    fn test_collect_none_is_empty() {
        assert!(collect_sources(None, 10).is_empty());
    }
}
