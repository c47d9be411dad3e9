//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

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

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `version` or `manifest` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `version` contains whitespace
    /// - `cache_prefix` is empty or ends with `-`
    /// - `origin` is not an http(s) URL
    /// - `max_bytes` is 0 or exceeds 512MB
    /// - `timeout_ms` is set below 100ms or above 5 minutes
    /// - `user_agent` is empty
    /// - `listen_addr` is not an `ip:port` socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(ConfigError::Missing {
                field: "version".into(),
                hint: "Set SHELLCACHE_VERSION to the deployment version".into(),
            });
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(invalid("version", "must not contain whitespace"));
        }

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_prefix.ends_with('-') {
            return Err(invalid("cache_prefix", "must not end with '-'; the separator is added automatically"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "must be an http or https URL"));
        }

        if self.manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "manifest".into(),
                hint: "List the application shell assets to precache".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 512 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 512MB"));
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let listen_addr: SocketAddr = self
            .listen_addr
            .parse()
            .map_err(|_| invalid("listen_addr", "must be an ip:port socket address"))?;
        if self.allow_forward && !listen_addr.ip().is_loopback() {
            tracing::warn!(
                listen_addr = %listen_addr,
                "allow_forward on a non-loopback address lets any reachable client use the proxy"
            );
        }

        if !self.manifest.iter().any(|entry| entry == &self.root_document) {
            tracing::warn!(
                root_document = %self.root_document,
                "root_document is not in the manifest; offline navigation fallback may find nothing"
            );
        }

        Ok(())
    }
}
