//! Immutable per-GET fetch records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HeaderPairs;

/// One observed GET of a URL: status, headers, body hash, and timing.
/// Snapshots are append-only; many exist per URL and none is ever mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub url: String,
    pub created: DateTime<Utc>,
    pub status: i32,
    /// Wall-clock from request send to body-read completion.
    pub duration_ms: i64,
    pub headers: HeaderPairs,
    pub hash: String,
}

impl Snapshot {
    pub fn new(
        url: String,
        created: DateTime<Utc>,
        status: i32,
        duration_ms: i64,
        headers: HeaderPairs,
        hash: String,
    ) -> Self {
        Self {
            url,
            created,
            status,
            duration_ms,
            headers,
            hash,
        }
    }
}
