//! In-memory cache backend.
//!
//! [`InMemoryBackend`] stores entries in a `DashMap` with an optional
//! deadline per entry. Expired entries are hidden on read and removed lazily,
//! by a sweep every [`DEFAULT_SWEEP_INTERVAL`] writes, or by
//! [`cleanup_expired`](CacheBackend::cleanup_expired).
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use procman_jobs::{InMemoryBackend, JobStore, ResultCache};
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let jobs = JobStore::new(backend.clone());
//! let results = ResultCache::new(backend);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::backend::{CacheBackend, StorageError};

/// Writes between two sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Thread-safe in-memory backend using [`DashMap`].
///
/// Contains no domain logic; see the crate root for the stores built on it.
#[derive(Debug)]
pub struct InMemoryBackend {
    data: DashMap<String, Entry>,
    writes: AtomicU64,
    sweep_interval: u64,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Creates an empty backend.
    ///
    /// # Examples
    ///
    /// ```
    /// use procman_jobs::InMemoryBackend;
    ///
    /// let backend = InMemoryBackend::new();
    /// assert!(backend.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            writes: AtomicU64::new(0),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Sweeps expired entries every `writes` writes. Zero disables the
    /// sweep.
    pub fn with_sweep_interval(mut self, writes: u64) -> Self {
        self.sweep_interval = writes;
        self
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.data.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired entries");
        }
        removed
    }

    /// Number of physically stored entries, including expired ones not yet
    /// cleaned up.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let now = Instant::now();
        let expired = match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(entry.data.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Err(StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn put(&self, key: &str, data: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
        // A ttl too large to represent never expires.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.data.insert(
            key.to_string(),
            Entry {
                data: data.to_vec(),
                expires_at,
            },
        );
        let written = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if self.sweep_interval > 0 && written % self.sweep_interval == 0 {
            self.sweep();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let now = Instant::now();
        Ok(self
            .data
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let now = Instant::now();
        Ok(self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        Ok(self.sweep())
    }
}
