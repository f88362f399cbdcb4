//! Source records: URL-prefix policies that decide what gets archived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::now_secs;

/// A URL-prefix policy record. A URL is eligible for archiving iff some
/// source's prefix contains it; sources with `crawl` set make their host a
/// crawl host whose pages are expanded recursively. Read-only to the
/// crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    /// URL prefix this source covers.
    pub url: String,
    /// Human-readable label.
    pub name: String,
    /// Whether the scheduler crawls this source's host recursively.
    pub crawl: bool,
    /// Per-source staleness override, in hours.
    pub stale_hours: Option<i64>,
    /// Ancillary metadata.
    pub metadata: serde_json::Value,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Source {
    pub fn new(url: String, name: String, crawl: bool) -> Self {
        let now = now_secs();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            name,
            crawl,
            stale_hours: None,
            metadata: serde_json::json!({}),
            created: now,
            updated: now,
        }
    }

    /// Whether this source's prefix contains the given normalized URL.
    pub fn contains(&self, url: &str) -> bool {
        !self.url.is_empty() && url.starts_with(self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_containment() {
        let source = Source::new(
            "http://example.com".to_string(),
            "Example".to_string(),
            true,
        );
        assert!(source.contains("http://example.com/a.html"));
        assert!(source.contains("http://example.com"));
        assert!(!source.contains("http://other.com/x"));
    }

    #[test]
    fn trailing_slash_on_prefix_is_ignored() {
        let source = Source::new(
            "http://example.com/docs/".to_string(),
            "Docs".to_string(),
            false,
        );
        assert!(source.contains("http://example.com/docs/report.pdf"));
        assert!(source.contains("http://example.com/docs"));
    }
}
