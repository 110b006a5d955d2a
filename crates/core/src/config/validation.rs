//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use thiserror::Error;

use crate::config::AppConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `default_format` is empty
    /// - `shard.width` is 0 while `shard.depth` is non-zero
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `queue_depth` or `queue_workers` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_format.is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_format".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.shard.depth > 0 && self.shard.width == 0 {
            return Err(ConfigError::Invalid {
                field: "shard.width".into(),
                reason: "must be at least 1 when shard.depth is non-zero".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "max_bytes".into(),
                reason: "must not exceed 50MB".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_agent".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_depth".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.queue_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_workers".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.secret_key.is_empty() {
            tracing::warn!("secret_key is empty; request signature verification is disabled");
        }

        Ok(())
    }
}
