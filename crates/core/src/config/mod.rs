//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Worker configuration with layered loading.
///
/// Everything the worker would otherwise read from ambient globals lives
/// here and is handed to the lifecycle controller at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the application the worker serves.
    ///
    /// Set via HARBOR_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every store generation this application owns.
    #[serde(default = "default_generation_prefix")]
    pub generation_prefix: String,

    /// Version suffix of the current generation.
    ///
    /// Set via HARBOR_GENERATION_VERSION; bump it on every deployment.
    #[serde(default = "default_generation_version")]
    pub generation_version: String,

    /// Path of the offline page served when a navigation cannot be satisfied.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Resources fetched into a new generation on install.
    ///
    /// Relative entries resolve against `origin`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Cross-origin origins intercepted and cached like same-origin ones.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Substrings that exclude a URL from ever being stored.
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// Entries older than this are removed by staleness eviction.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Deadline for delegated exchanges with a foreground context.
    ///
    /// `None` waits for a reply indefinitely.
    #[serde(default = "default_delegation_timeout_ms")]
    pub delegation_timeout_ms: Option<u64>,

    /// Path to the SQLite storage database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_generation_prefix() -> String {
    "qr-scanner-".into()
}

fn default_generation_version() -> String {
    "v2".into()
}

fn default_fallback_path() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/QRScanner.webapp.html",
        "/sw.js",
        "/manifest.json",
        "/jsQR.min.js",
        "/favicon-96x96.png",
        "/web-app-manifest-192x192.png",
        "/web-app-manifest-512x512.png",
        "/apple-touch-icon.png",
        "/offline.html",
        "https://cdnjs.cloudflare.com/ajax/libs/jsQR/1.4.0/jsQR.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/xlsx/0.18.5/xlsx.full.min.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["https://cdnjs.cloudflare.com".into()]
}

fn default_excluded_patterns() -> Vec<String> {
    ["/api/", "/analytics", "google-analytics.com", "googletagmanager.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_delegation_timeout_ms() -> Option<u64> {
    Some(5_000)
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./harbor-worker.sqlite")
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            generation_prefix: default_generation_prefix(),
            generation_version: default_generation_version(),
            fallback_path: default_fallback_path(),
            precache: default_precache(),
            allowed_origins: default_allowed_origins(),
            excluded_patterns: default_excluded_patterns(),
            max_age_secs: default_max_age_secs(),
            delegation_timeout_ms: default_delegation_timeout_ms(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Name of the current store generation.
    pub fn generation_name(&self) -> String {
        format!("{}{}", self.generation_prefix, self.generation_version)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Staleness threshold as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Optional delegation deadline as a Duration.
    pub fn delegation_timeout(&self) -> Option<Duration> {
        self.delegation_timeout_ms.map(Duration::from_millis)
    }

    /// Network timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HARBOR_`
    /// 2. TOML file from `HARBOR_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HARBOR_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
