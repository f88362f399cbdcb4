//! Content-addressed blob storage.
//!
//! The crawler only needs `PUT(key, bytes)` and an existence check; any
//! backing that provides both idempotently will do. The filesystem backend
//! is the production default; the in-memory backend serves tests.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("empty storage key")]
    EmptyKey,
    #[error("refusing to store empty body under {0}")]
    EmptyBody(String),
    #[error("invalid storage key {0}")]
    InvalidKey(String),
    #[error("storage io error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// A store of immutable bodies addressed by content hash.
///
/// `put` writes unconditionally; callers get idempotence by checking
/// `exists` first (a second write of the same key stores identical bytes,
/// so a lost race is harmless).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;
}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    if key.starts_with('/') || key.split('/').any(|part| part.is_empty() || part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("content/abcd").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/absolute").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/../b").is_err());
    }
}
