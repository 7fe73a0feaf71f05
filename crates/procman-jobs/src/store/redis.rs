//! Redis cache backend.
//!
//! [`RedisBackend`] implements [`CacheBackend`] with plain Redis strings:
//! `GET`, `SET`/`PSETEX`, `DEL` and `KEYS {prefix}*`. Expiry is native, so
//! [`cleanup_expired`](CacheBackend::cleanup_expired) is a no-op.
//!
//! # Key Schema
//!
//! | Key Pattern | Purpose |
//! |-------------|---------|
//! | `[{prefix}:]process_results:{fingerprint}` | Memoized result JSON |
//! | `[{prefix}:]job:{job_id}` | Job status record JSON |
//! | `[{prefix}:]process_registry:{process_id}:{version}` | Registration JSON |
//!
//! Without a prefix, keys are written bare so that several services can
//! share one Redis database.
//!
//! # Retries
//!
//! Connection-class failures (I/O errors, dropped connections, timeouts)
//! are retried with exponential backoff: 100 ms, 200 ms, 400 ms ... capped
//! at 10 s, for at most [`with_max_retries`](RedisBackend::with_max_retries)
//! attempts (default 3). Other errors surface immediately.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use procman_jobs::store::redis::RedisBackend;
//! use procman_jobs::JobStore;
//!
//! # async fn example() -> Result<(), procman_jobs::StorageError> {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await?;
//! let jobs = JobStore::new(Arc::new(backend));
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, RedisError, RedisResult};
use async_trait::async_trait;

use crate::store::backend::{CacheBackend, StorageError};

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Redis cache backend.
///
/// # Connection Model
///
/// Holds a [`MultiplexedConnection`], which is cheap to clone: all clones
/// share one TCP connection. Each call clones it.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: Option<String>,
    max_retries: u32,
}

impl RedisBackend {
    /// Connects to Redis at `url` (`redis://[:<password>@]<host>:<port>[/<db>]`).
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] if the client cannot be created or the
    /// connection cannot be established.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url).map_err(|e| StorageError::Backend {
            message: format!("failed to create Redis client: {e}"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to connect to Redis: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_connection(conn))
    }

    /// Wraps an existing multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Namespaces every key under `{prefix}:` (builder pattern).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.key_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Sets how many times a connection-class failure is retried.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn full_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    fn logical_key(&self, full_key: String) -> Option<String> {
        match &self.key_prefix {
            Some(prefix) => full_key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(str::to_string),
            None => Some(full_key),
        }
    }

    /// Runs `op` against a fresh connection clone, retrying transient
    /// failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, key: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(self.conn.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && is_transient(&err) => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        key,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient Redis failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(err) => return Err(map_redis_error(err, key)),
            }
        }
    }
}

/// Delay before retry number `attempt` (0-based): `100ms * 2^attempt`,
/// capped at 10 s.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    BACKOFF_BASE
        .checked_mul(factor)
        .map_or(BACKOFF_CAP, |delay| delay.min(BACKOFF_CAP))
}

fn is_transient(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

/// Maps a Redis error to a [`StorageError::Backend`].
fn map_redis_error(err: RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_key(key);
        let value: Option<Vec<u8>> = self
            .with_retry(key, |mut conn| {
                let full = full.clone();
                async move { conn.get(full).await }
            })
            .await?;
        value.ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn put(&self, key: &str, data: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
        let full = self.full_key(key);
        let data = data.to_vec();
        match ttl {
            // Redis rejects a zero expiry; one millisecond is the closest match.
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                self.with_retry(key, |mut conn| {
                    let (full, data) = (full.clone(), data.clone());
                    async move { conn.pset_ex::<_, _, ()>(full, data, millis).await }
                })
                .await
            },
            None => {
                self.with_retry(key, |mut conn| {
                    let (full, data) = (full.clone(), data.clone());
                    async move { conn.set::<_, _, ()>(full, data).await }
                })
                .await
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let full = self.full_key(key);
        let removed: usize = self
            .with_retry(key, |mut conn| {
                let full = full.clone();
                async move { conn.del(full).await }
            })
            .await?;
        Ok(removed > 0)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{}*", self.full_key(prefix));
        let keys: Vec<String> = self
            .with_retry(prefix, |mut conn| {
                let pattern = pattern.clone();
                async move { conn.keys(pattern).await }
            })
            .await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| self.logical_key(key))
            .collect())
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}
