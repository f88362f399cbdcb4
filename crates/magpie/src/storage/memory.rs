//! In-memory blob store for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, BlobStore, StorageError};

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored body, mainly useful in assertions.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.blobs.read().await.contains_key(key))
    }

    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        if content.is_empty() {
            return Err(StorageError::EmptyBody(key.to_string()));
        }
        self.blobs
            .write()
            .await
            .insert(key.to_string(), content.to_vec());
        Ok(())
    }
}
