//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `namespace` or `version` is empty.
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `namespace` or `version` contains whitespace
    /// - `origin` is not an absolute http(s) URL with a host
    /// - a `precache` entry is not root-relative
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Missing {
                field: "namespace".into(),
                hint: "Set OFFCACHE_NAMESPACE environment variable".into(),
            });
        }
        if self.namespace.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid { field: "namespace".into(), reason: "must not contain whitespace".into() });
        }

        if self.version.is_empty() {
            return Err(ConfigError::Missing {
                field: "version".into(),
                hint: "Set OFFCACHE_VERSION environment variable".into(),
            });
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not contain whitespace".into() });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: "must be an http(s) URL with a host".into(),
            });
        }

        if let Some(entry) = self.precache.iter().find(|p| !p.starts_with('/') || p.starts_with("//")) {
            return Err(ConfigError::Invalid {
                field: "precache".into(),
                reason: format!("entry {entry:?} must be a root-relative path"),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.precache.is_empty() {
            tracing::warn!(store = %self.cache_name(), "precache manifest is empty; nothing will be available offline until fetched");
        }

        Ok(())
    }
}
