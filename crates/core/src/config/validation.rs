//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn require_http_origin(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(field, format!("{value}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(field, format!("{value}: unsupported scheme {scheme}"))),
    }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` or any allow-listed origin is not an http(s) URL
    /// - `generation_prefix` or `generation_version` is empty
    /// - `fallback_path` is not absolute or is missing from `precache`
    /// - `max_age_secs` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `delegation_timeout_ms` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_origin("origin", &self.origin)?;
        for origin in &self.allowed_origins {
            require_http_origin("allowed_origins", origin)?;
        }

        if self.generation_prefix.is_empty() {
            return Err(invalid("generation_prefix", "must not be empty"));
        }
        if self.generation_version.is_empty() {
            return Err(invalid("generation_version", "must not be empty"));
        }

        if !self.fallback_path.starts_with('/') {
            return Err(invalid("fallback_path", "must be an absolute path"));
        }
        if !self.precache.iter().any(|p| p == &self.fallback_path) {
            return Err(invalid("precache", format!("must include the fallback page {}", self.fallback_path)));
        }

        if self.max_age_secs == 0 {
            return Err(invalid("max_age_secs", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.delegation_timeout_ms == Some(0) {
            return Err(invalid("delegation_timeout_ms", "must be greater than 0 when set"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.excluded_patterns.iter().any(|p| p.is_empty()) {
            tracing::warn!("empty entry in excluded_patterns ignored");
        }

        Ok(())
    }
}
