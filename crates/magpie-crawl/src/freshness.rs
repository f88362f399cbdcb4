//! Fetchability and staleness predicates.
//!
//! Pure functions: the scheduler decides *whether* to enqueue from these,
//! the queues decide *when* to dispatch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use magpie::models::Url;

/// Only http(s) URLs (or scheme-less strings, which resolve against a
/// base elsewhere) are ever dispatched.
pub fn is_fetchable(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// Whether a HEAD should be enqueued for this record.
pub fn should_enqueue_head(record: &Url, stale: Duration, now: DateTime<Utc>) -> bool {
    is_fetchable(&record.url) && is_stale(record.last_head, stale, now)
}

/// Whether a GET should be enqueued for this record.
pub fn should_enqueue_get(record: &Url, stale: Duration, now: DateTime<Utc>) -> bool {
    is_fetchable(&record.url) && is_stale(record.last_get, stale, now)
}

fn is_stale(last: Option<DateTime<Utc>>, stale: Duration, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(t) => {
            let stale = chrono::Duration::from_std(stale).unwrap_or(chrono::Duration::MAX);
            now.signed_duration_since(t) > stale
        }
    }
}
