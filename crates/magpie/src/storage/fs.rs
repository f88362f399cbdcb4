//! Filesystem blob store: one file per body under a root directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{validate_key, BlobStore, StorageError};

/// Blob store writing bodies to `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        if content.is_empty() {
            return Err(StorageError::EmptyBody(key.to_string()));
        }
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(key, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        debug!("stored {} bytes at {}", content.len(), path.display());
        Ok(())
    }
}
