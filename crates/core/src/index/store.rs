//! Key-value store abstraction behind the cache index.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;

/// Capability contract for index backends.
///
/// The backend owns its concurrent-access safety; the index layers
/// namespacing and miss-handling policy on top.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Fetch the value for a key, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a key-value mapping.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

/// In-memory index backend for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
