//! Content pipeline: fingerprint response bodies and persist them.

use std::sync::Arc;

use magpie::hash::{multihash_hex, storage_digest};
use magpie::storage::{BlobStore, StorageError};
use tracing::debug;

use crate::sniff;

/// Hashes bodies and writes storable ones to the blob store under
/// `<bucket_path>/<digest>`.
#[derive(Clone)]
pub struct ContentPipeline {
    blob: Arc<dyn BlobStore>,
    bucket_path: String,
    store_content_types: Vec<String>,
}

impl ContentPipeline {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        bucket_path: String,
        store_content_types: Vec<String>,
    ) -> Self {
        Self {
            blob,
            bucket_path,
            store_content_types,
        }
    }

    /// Multihash of a body.
    pub fn fingerprint(&self, body: &[u8]) -> String {
        multihash_hex(body)
    }

    /// Blob-store key for a multihash.
    pub fn storage_key(&self, hash: &str) -> String {
        let prefix = self.bucket_path.trim_matches('/');
        if prefix.is_empty() {
            storage_digest(hash).to_string()
        } else {
            format!("{}/{}", prefix, storage_digest(hash))
        }
    }

    /// Storage eligibility for a sniffed type fetched from a URL.
    pub fn should_store(&self, content_sniff: &str, url: &str) -> bool {
        sniff::is_storable(content_sniff, url, &self.store_content_types)
    }

    /// Idempotent PUT: skip when the key already exists. Returns whether
    /// an upload happened.
    pub async fn store(&self, url: &str, hash: &str, body: &[u8]) -> Result<bool, StorageError> {
        if hash.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        if body.is_empty() {
            return Err(StorageError::EmptyBody(url.to_string()));
        }
        let key = self.storage_key(hash);
        if self.blob.exists(&key).await? {
            debug!("blob {} already stored, skipping {}", key, url);
            return Ok(false);
        }
        self.blob.put(&key, body).await?;
        Ok(true)
    }
}
