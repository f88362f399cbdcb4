//! Crawl engine error types.

use magpie::repository::DieselError;
use magpie::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the crawl engine.
///
/// Transport and store failures are logged and the in-flight entry is
/// cleared; nothing retries. The staleness sweep re-enqueues on its next
/// pass. Invalid input and out-of-scope submissions surface to the caller.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid url: {0}")]
    InvalidInput(String),
    #[error("url is not contained in any source prefix: {0}")]
    NotArchivable(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store error: {0}")]
    Store(#[from] DieselError),
    #[error("blob store error: {0}")]
    Blob(#[from] StorageError),
    #[error("{0}")]
    Internal(String),
}

impl CrawlError {
    /// Whether this error is the caller's fault (maps to HTTP 400).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotArchivable(_))
    }
}
