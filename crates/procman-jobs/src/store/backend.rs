//! Low-level key-value cache backend trait and supporting types.
//!
//! The [`CacheBackend`] trait is the contract every storage engine
//! implements: [`get`](CacheBackend::get), [`put`](CacheBackend::put) with an
//! optional time-to-live, [`delete`](CacheBackend::delete),
//! [`keys`](CacheBackend::keys) for prefix-scoped enumeration, and
//! [`cleanup_expired`](CacheBackend::cleanup_expired).
//!
//! Backends are dumb stores. Serialization, lifecycle rules and retention
//! policy live in [`JobStore`](crate::JobStore) and
//! [`ResultCache`](crate::ResultCache).
//!
//! # Key Structure
//!
//! Keys are `{namespace}:{id}`. The namespaces in use are
//! [`RESULTS_NAMESPACE`](crate::RESULTS_NAMESPACE),
//! [`JOBS_NAMESPACE`](crate::JOBS_NAMESPACE) and
//! [`REGISTRY_NAMESPACE`](crate::REGISTRY_NAMESPACE). The id part may itself
//! contain colons (registrations use `{process_id}:{version}`), so keys are
//! split on the first colon only.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors that can occur during raw storage operations.
///
/// # Examples
///
/// ```
/// use procman_jobs::StorageError;
///
/// let err = StorageError::NotFound { key: "job:123".to_string() };
/// assert!(err.to_string().contains("job:123"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// The requested key does not exist or has expired.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// An I/O or backend-specific error occurred (network failure,
    /// timeout, protocol error).
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available. Accessible via
        /// [`std::error::Error::source()`].
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Shorthand for a [`StorageError::Backend`] without a source.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value store with per-entry expiry.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one backend instance is shared by
/// the job store, the result cache and the process registry.
///
/// # Expiry
///
/// An entry written with a `ttl` must become invisible to
/// [`get`](CacheBackend::get) and [`keys`](CacheBackend::keys) once the ttl
/// has elapsed. Physical removal may happen later.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Retrieves the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the key is absent or expired.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Stores `data` under `key`, replacing any previous value.
    ///
    /// `ttl` of `None` means the entry never expires.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put(&self, key: &str, data: &[u8], ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Deletes a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Lists every live key that starts with `prefix`, in no particular
    /// order.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Returns `true` if `key` holds a live entry.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Physically removes expired entries and returns how many were removed.
    ///
    /// Best effort. Backends with native expiry return `Ok(0)`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn cleanup_expired(&self) -> Result<usize, StorageError>;
}

/// Builds a storage key from a namespace and an id.
///
/// # Examples
///
/// ```
/// use procman_jobs::store::backend::make_key;
///
/// assert_eq!(make_key("job", "abc"), "job:abc");
/// assert_eq!(make_key("process_registry", "echo:1.0.0"), "process_registry:echo:1.0.0");
/// ```
pub fn make_key(namespace: &str, id: &str) -> String {
    format!("{namespace}:{id}")
}

/// Builds the prefix that enumerates a whole namespace.
///
/// # Examples
///
/// ```
/// use procman_jobs::store::backend::make_prefix;
///
/// assert_eq!(make_prefix("job"), "job:");
/// ```
pub fn make_prefix(namespace: &str) -> String {
    format!("{namespace}:")
}

/// Strips `{namespace}:` from a key, returning the id part.
///
/// Returns `None` when the key belongs to another namespace.
///
/// # Examples
///
/// ```
/// use procman_jobs::store::backend::strip_namespace;
///
/// assert_eq!(strip_namespace("job", "job:abc"), Some("abc"));
/// assert_eq!(strip_namespace("job", "process_results:abc"), None);
/// assert_eq!(strip_namespace("job", "jobs:abc"), None);
/// ```
pub fn strip_namespace<'a>(namespace: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(namespace)?.strip_prefix(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = StorageError::NotFound {
            key: "job:1".to_string(),
        };
        assert_eq!(err.to_string(), "key not found: job:1");

        let err = StorageError::backend("connection timeout");
        assert_eq!(err.to_string(), "backend error: connection timeout");
    }

    #[test]
    fn storage_error_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = StorageError::Backend {
            message: "db failed".to_string(),
            source: Some(Box::new(inner)),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("timed out"));

        let err = StorageError::NotFound {
            key: "k".to_string(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn ids_may_contain_colons() {
        let key = make_key("process_registry", "echo:2.0");
        assert_eq!(strip_namespace("process_registry", &key), Some("echo:2.0"));
    }

    #[test]
    fn empty_id_round_trips() {
        assert_eq!(strip_namespace("job", &make_key("job", "")), Some(""));
    }
}
