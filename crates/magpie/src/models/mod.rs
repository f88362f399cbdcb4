//! Domain entities of the archive: URLs, links, snapshots, and sources.

mod link;
mod snapshot;
mod source;
mod url;

pub use link::Link;
pub use snapshot::Snapshot;
pub use source::Source;
pub use url::Url;

use chrono::{DateTime, Timelike, Utc};

/// Ordered response header pairs, serialized as a JSON array.
pub type HeaderPairs = Vec<(String, String)>;

/// Current time truncated to second resolution, matching what the store
/// round-trips.
pub fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}
