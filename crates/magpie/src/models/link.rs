//! Directed edges of the crawled hypertext graph.
//!
//! Links are stored as `(src, dst)` pairs of normalized URL strings rather
//! than object references; the graph is cyclic and string keys keep it
//! flat. A pair is created once and only `updated` moves on re-observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::now_secs;

/// A directed link between two URL records, identified by `(src, dst)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub src: String,
    pub dst: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Link {
    pub fn new(src: String, dst: String, now: DateTime<Utc>) -> Self {
        Self {
            src,
            dst,
            created: now,
            updated: now,
        }
    }

    /// Convenience constructor stamping the current time.
    pub fn observed_now(src: String, dst: String) -> Self {
        Self::new(src, dst, now_secs())
    }
}
