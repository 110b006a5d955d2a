//! Filesystem storage backend.
//!
//! Objects live under a configured root directory; sharded destination
//! paths become nested directories created on first write. Paths are
//! validated so a crafted key cannot escape the root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStorage, StorageError};

/// Object storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path under the root, rejecting absolute paths and
    /// parent-directory traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        }) {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FsStorage {
    async fn save(
        &self, path: &str, bytes: Bytes, _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(path = %target.display(), bytes = bytes.len(), "wrote object");
        Ok(())
    }

    async fn open(&self, path: &str) -> Result<Bytes, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }
}
