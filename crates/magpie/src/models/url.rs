//! URL records, the primary entity of the archive.
//!
//! A record is created the first time a URL is discovered (link extraction,
//! seed submission, or a configured source) and is mutated by the response
//! handler after each HEAD and GET. Records are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{now_secs, HeaderPairs};

/// A URL known to the archive, keyed by its normalized string form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Url {
    /// Stable opaque identifier, assigned on creation.
    pub id: String,
    /// Normalized absolute URL; globally unique natural key.
    pub url: String,
    /// Host component of `url`.
    pub host: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Most recent successful HEAD, if any.
    pub last_head: Option<DateTime<Utc>>,
    /// Most recent successful GET, if any.
    pub last_get: Option<DateTime<Utc>>,
    /// Status of the most recent response; -1 if never fetched.
    pub status: i32,
    /// Declared Content-Type header from the last response.
    pub content_type: String,
    /// Byte-sniffed mime of the last body; authoritative over the header.
    pub content_sniff: String,
    /// Body length in bytes; -1 for unknown.
    pub content_length: i64,
    /// Guessed filename when the path suggests a downloadable file.
    pub file_name: String,
    /// HTML `<title>` text, when applicable.
    pub title: String,
    /// Ordered header pairs from the last response.
    pub headers: HeaderPairs,
    /// Multihash of the last response body; empty if never hashed.
    pub hash: String,
}

impl Url {
    /// Create a fresh, never-fetched record.
    pub fn new(url: String, host: String) -> Self {
        let now = now_secs();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            host,
            created: now,
            updated: now,
            last_head: None,
            last_get: None,
            status: -1,
            content_type: String::new(),
            content_sniff: String::new(),
            content_length: -1,
            file_name: String::new(),
            title: String::new(),
            headers: Vec::new(),
            hash: String::new(),
        }
    }

    /// Whether a GET has ever completed for this URL.
    pub fn is_fetched(&self) -> bool {
        self.last_get.is_some()
    }

    /// Record the observations of a HEAD response.
    pub fn apply_head(
        &mut self,
        status: i32,
        content_type: &str,
        content_length: i64,
        headers: HeaderPairs,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.content_type = content_type.to_string();
        self.content_length = content_length;
        self.headers = headers;
        self.last_head = Some(now);
        self.updated = now;
    }

    /// Record the observations of a GET response.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_get(
        &mut self,
        status: i32,
        content_type: &str,
        content_sniff: String,
        content_length: i64,
        headers: HeaderPairs,
        hash: String,
        title: Option<String>,
        file_name: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.content_type = content_type.to_string();
        self.content_sniff = content_sniff;
        self.content_length = content_length;
        self.headers = headers;
        self.hash = hash;
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(file_name) = file_name {
            self.file_name = file_name;
        }
        self.last_get = Some(now);
        self.updated = now;
    }
}
