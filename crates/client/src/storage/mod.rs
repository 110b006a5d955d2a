//! Object-storage backends for original images and computed variants.
//!
//! Source and destination storage are configured independently and accessed
//! through the same narrow capability contract: save bytes at a path, open
//! bytes at a path, check existence. Backends own their concurrency safety.

pub mod fs;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use prism_core::config::StorageConfig;

pub use fs::FsStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Object-storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Capability contract for object-storage backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write object bytes at `path`, creating intermediate structure as
    /// needed. Overwrites an existing object at the same path.
    async fn save(
        &self, path: &str, bytes: Bytes, content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Read the object at `path`.
    async fn open(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Build a storage backend from configuration.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    match config {
        StorageConfig::Fs { root } => Ok(Arc::new(FsStorage::new(root.clone()))),
        StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "s3")]
        StorageConfig::S3 { bucket } => Ok(Arc::new(S3Storage::from_env(bucket.clone()).await)),
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => Err(StorageError::Backend(
            "s3 storage requires building with the s3 feature".into(),
        )),
    }
}

/// In-memory storage backend for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn save(
        &self, path: &str, bytes: Bytes, _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.objects.write().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn open(&self, path: &str) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .save("de/ad/beef.png", Bytes::from_static(b"pixels"), Some("image/png"))
            .await
            .unwrap();

        assert!(storage.exists("de/ad/beef.png").await.unwrap());
        assert_eq!(storage.open("de/ad/beef.png").await.unwrap(), Bytes::from_static(b"pixels"));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_storage_missing_object() {
        let storage = MemoryStorage::new();
        assert!(!storage.exists("nope.png").await.unwrap());
        assert!(matches!(storage.open("nope.png").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_from_config_memory() {
        let storage = from_config(&StorageConfig::Memory).await.unwrap();
        storage
            .save("a.png", Bytes::from_static(b"x"), None)
            .await
            .unwrap();
        assert!(storage.exists("a.png").await.unwrap());
    }
}
