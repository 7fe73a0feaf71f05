//! Fingerprint-addressed result cache.

use std::sync::Arc;

use serde_json::Value;

use crate::constants::RESULTS_NAMESPACE;
use crate::error::JobError;
use crate::store::backend::{make_key, CacheBackend, StorageError};
use crate::store::StoreConfig;

/// Memoized process outputs keyed by input fingerprint.
///
/// Entries expire after [`StoreConfig::retention`]. A write for a fingerprint
/// that is already cached replaces the value and restarts its retention.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use procman_jobs::{InMemoryBackend, ResultCache};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), procman_jobs::JobError> {
/// let cache = ResultCache::new(Arc::new(InMemoryBackend::new()));
/// assert!(!cache.contains("abc").await?);
///
/// cache.put("abc", &json!({"result": "ABC"})).await?;
/// assert_eq!(cache.get("abc").await?, Some(json!({"result": "ABC"})));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    config: StoreConfig,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    /// Creates a cache with [`StoreConfig::default`].
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    /// Sets the retention configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage key for a fingerprint.
    pub fn key(fingerprint: &str) -> String {
        make_key(RESULTS_NAMESPACE, fingerprint)
    }

    /// Returns `true` if a live result exists for `fingerprint`.
    pub async fn contains(&self, fingerprint: &str) -> Result<bool, JobError> {
        Ok(self.backend.exists(&Self::key(fingerprint)).await?)
    }

    /// Loads the result for `fingerprint`, if cached.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<Value>, JobError> {
        let key = Self::key(fingerprint);
        match self.backend.get(&key).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| JobError::Serialization {
                    key,
                    message: e.to_string(),
                }),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores the result for `fingerprint`.
    pub async fn put(&self, fingerprint: &str, result: &Value) -> Result<(), JobError> {
        let key = Self::key(fingerprint);
        let data = serde_json::to_vec(result).map_err(|e| JobError::Serialization {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.backend.put(&key, &data, self.config.retention).await?;
        tracing::debug!(fingerprint, "result cached");
        Ok(())
    }

    /// Drops the cached result. Returns `true` if one existed.
    pub async fn remove(&self, fingerprint: &str) -> Result<bool, JobError> {
        Ok(self.backend.delete(&Self::key(fingerprint)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn results_live_in_their_namespace() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = ResultCache::new(backend.clone());
        cache.put("f1", &json!("v")).await.unwrap();
        assert_eq!(
            backend.keys("process_results:").await.unwrap(),
            vec!["process_results:f1".to_string()]
        );
    }

    #[tokio::test]
    async fn retention_expires_results() {
        let cache = ResultCache::new(Arc::new(InMemoryBackend::new())).with_config(StoreConfig {
            retention: Some(Duration::from_millis(20)),
            ..StoreConfig::default()
        });
        cache.put("f1", &json!(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let cache = ResultCache::new(Arc::new(InMemoryBackend::new()));
        cache.put("f1", &json!(null)).await.unwrap();
        assert!(cache.contains("f1").await.unwrap());
        assert!(cache.remove("f1").await.unwrap());
        assert!(!cache.remove("f1").await.unwrap());
    }
}
