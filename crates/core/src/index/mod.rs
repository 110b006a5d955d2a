//! The cache index: a persisted `prefixed key -> stored path` mapping.
//!
//! The index is the single source of truth for "does a variant already exist
//! and where". It is backed by a pluggable key-value store:
//!
//! - SQLite via tokio-rusqlite (WAL mode, versioned migrations)
//! - An in-memory map for tests and ephemeral deployments
//!
//! Lookup is fail-open: a store error on the read path is logged and treated
//! as a miss, so a degraded store costs recomputation rather than failing
//! requests. Writes are never swallowed.

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod store;

use std::sync::Arc;

pub use connection::SqliteIndex;
pub use store::{IndexStore, MemoryIndex};

use crate::Error;

/// Namespaced view over an [`IndexStore`].
///
/// Every key is prefixed with a process-wide namespace string so multiple
/// logical caches can share one store instance. An empty prefix is valid.
#[derive(Clone)]
pub struct CacheIndex {
    store: Arc<dyn IndexStore>,
    prefix: String,
}

impl CacheIndex {
    pub fn new(store: Arc<dyn IndexStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    /// The full index key for a request key.
    pub fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Look up the stored path for a request key.
    ///
    /// A store failure is treated as a miss: the pipeline can always fall
    /// back to recomputation, which is preferable to failing the request.
    pub async fn lookup(&self, key: &str) -> Option<String> {
        let prefixed = self.prefixed(key);
        match self.store.get(&prefixed).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key = %prefixed, error = %err, "index lookup failed, treating as miss");
                None
            }
        }
    }

    /// Record the stored path for a request key. Failures propagate.
    pub async fn record(&self, key: &str, stored_path: &str) -> Result<(), Error> {
        let prefixed = self.prefixed(key);
        self.store.set(&prefixed, stored_path).await?;
        tracing::info!(key = %prefixed, path = %stored_path, "recorded index entry");
        Ok(())
    }
}
