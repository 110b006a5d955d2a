//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRISM_*)
//! 2. TOML config file (if PRISM_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Configuration is loaded once at startup and read-only thereafter.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::shard::ShardConfig;

mod validation;

pub use validation::ConfigError;

/// Index backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum IndexConfig {
    /// Persistent SQLite store.
    Sqlite {
        #[serde(default = "default_db_path")]
        db_path: PathBuf,
    },
    /// Process-local map, lost on restart.
    Memory,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./prism-index.sqlite")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::Sqlite { db_path: default_db_path() }
    }
}

/// Object storage backend selection; source and destination are configured
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem rooted at `root`.
    Fs { root: PathBuf },
    /// Process-local map, lost on restart.
    Memory,
    /// S3-compatible bucket; requires the `s3` cargo feature.
    S3 { bucket: String },
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRISM_*)
/// 2. TOML config file (if PRISM_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Namespace prefix for cache-index keys. Empty means no namespacing.
    #[serde(default)]
    pub prefix: String,

    /// Shared secret for request signatures. Empty disables verification.
    #[serde(default)]
    pub secret_key: String,

    /// Output format used when a request carries no explicit override.
    #[serde(default = "default_format")]
    pub default_format: String,

    /// Destination path sharding.
    #[serde(default)]
    pub shard: ShardConfig,

    /// Cache index backend.
    #[serde(default)]
    pub index: IndexConfig,

    /// Where original images are read from.
    #[serde(default = "default_source_storage")]
    pub source_storage: StorageConfig,

    /// Where computed variants are written.
    #[serde(default = "default_dest_storage")]
    pub dest_storage: StorageConfig,

    /// User-Agent string for remote source fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept for one source image.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Remote fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Capacity of the detached persistence queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Number of workers draining the persistence queue.
    #[serde(default = "default_queue_workers")]
    pub queue_workers: usize,
}

fn default_format() -> String {
    "png".into()
}

fn default_source_storage() -> StorageConfig {
    StorageConfig::Fs { root: PathBuf::from("./images") }
}

fn default_dest_storage() -> StorageConfig {
    StorageConfig::Fs { root: PathBuf::from("./cache") }
}

fn default_user_agent() -> String {
    "prism/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_queue_depth() -> usize {
    256
}

fn default_queue_workers() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            secret_key: String::new(),
            default_format: default_format(),
            shard: ShardConfig::default(),
            index: IndexConfig::default(),
            source_storage: default_source_storage(),
            dest_storage: default_dest_storage(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            queue_depth: default_queue_depth(),
            queue_workers: default_queue_workers(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRISM_`
    /// 2. TOML file from `PRISM_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRISM_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRISM_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
