//! Service configuration.
//!
//! Configuration can be loaded from:
//! 1. A TOML file (`procman.toml` by convention)
//! 2. Environment variables with the `PROCMAN_` prefix
//!
//! Environment variables override TOML values, which override defaults.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! retention_secs = 604800
//! cache_check_timeout_ms = 1000
//! queue_concurrency = 8
//! base_path = "/api"
//! redis_url = "redis://127.0.0.1:6379"
//! log_level = "debug"
//! ```

use std::path::Path;
use std::time::Duration;

use procman_jobs::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "PROCMAN_";

/// Settings for the registry, orchestrator, stores and local queue.
///
/// # Defaults
///
/// | Setting                  | Default   | Description                                 |
/// |--------------------------|-----------|---------------------------------------------|
/// | `retention_secs`         | 604,800   | 7 days for job records and cached results   |
/// | `cache_check_timeout_ms` | 1,000     | Bound on the cache-hit check                |
/// | `store_timeout_ms`       | 10,000    | Bound on other store round-trips            |
/// | `queue_timeout_ms`       | 10,000    | Bound on queue submit/fetch/forget          |
/// | `queue_concurrency`      | 4         | Tasks the local queue runs at once          |
/// | `default_page_limit`     | 10        | Page size when the caller gives none        |
/// | `max_page_limit`         | 1,000     | Upper clamp for page sizes                  |
/// | `base_path`              | `""`      | Prefix for generated links                  |
/// | `redis_url`              | unset     | Redis connection URL                        |
/// | `key_prefix`             | unset     | Namespace for Redis keys                    |
/// | `log_level`              | `"info"`  | Fallback filter when `RUST_LOG` is unset    |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Retention for job records and cached results, in seconds.
    pub retention_secs: u64,

    /// Timeout for the cache-hit check, in milliseconds.
    pub cache_check_timeout_ms: u64,

    /// Timeout for other store calls, in milliseconds.
    pub store_timeout_ms: u64,

    /// Timeout for queue calls, in milliseconds.
    pub queue_timeout_ms: u64,

    /// Concurrent task limit for the in-process queue.
    pub queue_concurrency: usize,

    /// Page size used when a listing gives no limit.
    pub default_page_limit: usize,

    /// Largest accepted page size.
    pub max_page_limit: usize,

    /// Prefix for `self`/`results` links, without a trailing slash.
    pub base_path: String,

    /// Redis URL, when the Redis backend is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    /// Namespace for Redis keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retention_secs: procman_jobs::DEFAULT_RETENTION_SECS,
            cache_check_timeout_ms: 1_000,
            store_timeout_ms: 10_000,
            queue_timeout_ms: 10_000,
            queue_concurrency: 4,
            default_page_limit: 10,
            max_page_limit: 1_000,
            base_path: String::new(),
            redis_url: None,
            key_prefix: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Loads a TOML file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)?.with_env_overrides()
    }

    /// Parses TOML content. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] on malformed TOML or invalid values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `PROCMAN_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a variable does not parse or the result is invalid.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlays `PROCMAN_*` environment variables onto this configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a variable does not parse or the result is invalid.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`, which is called with full variable
    /// names such as `PROCMAN_QUEUE_CONCURRENCY`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a value does not parse or the result is invalid.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(v) = var("RETENTION_SECS") {
            self.retention_secs = parse_var("RETENTION_SECS", &v)?;
        }
        if let Some(v) = var("CACHE_CHECK_TIMEOUT_MS") {
            self.cache_check_timeout_ms = parse_var("CACHE_CHECK_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("STORE_TIMEOUT_MS") {
            self.store_timeout_ms = parse_var("STORE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("QUEUE_TIMEOUT_MS") {
            self.queue_timeout_ms = parse_var("QUEUE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("QUEUE_CONCURRENCY") {
            self.queue_concurrency = parse_var("QUEUE_CONCURRENCY", &v)?;
        }
        if let Some(v) = var("DEFAULT_PAGE_LIMIT") {
            self.default_page_limit = parse_var("DEFAULT_PAGE_LIMIT", &v)?;
        }
        if let Some(v) = var("MAX_PAGE_LIMIT") {
            self.max_page_limit = parse_var("MAX_PAGE_LIMIT", &v)?;
        }
        if let Some(v) = var("BASE_PATH") {
            self.base_path = v;
        }
        if let Some(v) = var("REDIS_URL") {
            self.redis_url = Some(v);
        }
        if let Some(v) = var("KEY_PREFIX") {
            self.key_prefix = Some(v);
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks that timeouts and limits are usable.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.cache_check_timeout_ms == 0, "cache_check_timeout_ms must be positive"),
            (self.store_timeout_ms == 0, "store_timeout_ms must be positive"),
            (self.queue_timeout_ms == 0, "queue_timeout_ms must be positive"),
            (self.queue_concurrency == 0, "queue_concurrency must be positive"),
            (self.max_page_limit == 0, "max_page_limit must be positive"),
            (
                self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit,
                "default_page_limit must be between 1 and max_page_limit",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(Error::Config((*message).to_string())),
            None => Ok(()),
        }
    }

    /// Retention as a duration. Zero means entries never expire.
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_secs > 0).then(|| Duration::from_secs(self.retention_secs))
    }

    /// Cache-hit check timeout.
    pub fn cache_check_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_check_timeout_ms)
    }

    /// Store call timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Queue call timeout.
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    /// Clamps a requested page size into `[1, max_page_limit]`.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit)
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            retention: self.retention(),
            base_path: self.base_path.trim_end_matches('/').to_string(),
        }
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(suffix: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{ENV_PREFIX}{suffix}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retention(), Some(Duration::from_secs(604_800)));
        assert_eq!(config.cache_check_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn toml_fills_missing_keys_with_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            queue_concurrency = 8
            base_path = "/api/"
            "#,
        )
        .unwrap();
        assert_eq!(config.queue_concurrency, 8);
        assert_eq!(config.store_config().base_path, "/api");
        assert_eq!(config.store_timeout_ms, 10_000);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ServiceConfig::from_toml("queue_concurrency = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = ServiceConfig::from_toml("queue_concurrency = 8")
            .unwrap()
            .with_overrides(lookup(&[
                ("PROCMAN_QUEUE_CONCURRENCY", "2"),
                ("PROCMAN_REDIS_URL", "redis://cache:6379"),
            ]))
            .unwrap();
        assert_eq!(config.queue_concurrency, 2);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn unparsable_override_names_the_variable() {
        let err = ServiceConfig::default()
            .with_overrides(lookup(&[("PROCMAN_STORE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("PROCMAN_STORE_TIMEOUT_MS"));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let err = ServiceConfig::from_toml("cache_check_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("cache_check_timeout_ms"));
    }

    #[test]
    fn page_limit_is_clamped() {
        let config = ServiceConfig::default();
        assert_eq!(config.page_limit(None), 10);
        assert_eq!(config.page_limit(Some(0)), 1);
        assert_eq!(config.page_limit(Some(50_000)), 1_000);
    }

    #[test]
    fn zero_retention_never_expires() {
        let config = ServiceConfig {
            retention_secs: 0,
            ..ServiceConfig::default()
        };
        assert_eq!(config.store_config().retention, None);
    }

    #[test]
    fn file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let original = ServiceConfig {
            queue_concurrency: 16,
            log_level: "debug".to_string(),
            ..ServiceConfig::default()
        };
        std::io::Write::write_all(&mut file, original.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.queue_concurrency, 16);
        assert_eq!(loaded.log_level, "debug");
    }
}
