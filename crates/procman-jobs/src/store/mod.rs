//! Cache backend contract, backends, and the domain stores layered on it.
//!
//! # Architecture
//!
//! 1. **[`CacheBackend`]** -- Dumb key-value trait with per-entry expiry
//!    (in-memory, Redis). No domain logic.
//!
//! 2. **[`JobStore`](jobs::JobStore)** -- Job status records under
//!    `job:{id}`: lifecycle rules, links, listing.
//!
//! 3. **[`ResultCache`](results::ResultCache)** -- Memoized process outputs
//!    under `process_results:{fingerprint}`.
//!
//! Both domain stores hold an `Arc<dyn CacheBackend>` so a single backend
//! (and a single Redis connection) serves all namespaces.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](memory::InMemoryBackend) -- `DashMap` with lazy
//!   expiry. Default for tests and single-process deployments.
//! - [`RedisBackend`](redis::RedisBackend) -- Redis with native expiry.
//!   Available behind the `redis` feature flag.

pub mod backend;
pub mod jobs;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod results;

use std::time::Duration;

pub use backend::{CacheBackend, StorageError};

use crate::constants::DEFAULT_RETENTION_SECS;

/// Retention and link settings shared by the job store and result cache.
///
/// # Defaults
///
/// | Setting     | Default  | Description                                 |
/// |-------------|----------|---------------------------------------------|
/// | `retention` | 7 days   | TTL applied to job records and results      |
/// | `base_path` | `""`     | Prefix for `self`/`results` links on jobs   |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use procman_jobs::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.retention, Some(Duration::from_secs(604_800)));
/// assert_eq!(config.base_path, "");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Time-to-live for written entries. `None` keeps entries forever.
    pub retention: Option<Duration>,

    /// Path prefix for job links, without a trailing slash.
    pub base_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: Some(Duration::from_secs(DEFAULT_RETENTION_SECS)),
            base_path: String::new(),
        }
    }
}

/// Offset/limit parameters for job listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListJobsOptions {
    /// Number of jobs to skip.
    pub offset: usize,
    /// Maximum number of jobs to return.
    pub limit: usize,
}

impl Default for ListJobsOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
        }
    }
}
