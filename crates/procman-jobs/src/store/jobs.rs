//! Job status store.
//!
//! [`JobStore`] persists [`JobStatusRecord`]s under `job:{job_id}` and owns
//! their lifecycle rules. Writes are last-write-wins; there is no
//! compare-and-swap, so concurrent writers to the same job race and the
//! later write is kept.

use std::sync::Arc;

use crate::constants::JOBS_NAMESPACE;
use crate::error::JobError;
use crate::page::Page;
use crate::record::{JobResult, JobStatusRecord};
use crate::store::backend::{make_key, make_prefix, strip_namespace, CacheBackend, StorageError};
use crate::store::{ListJobsOptions, StoreConfig};

/// Persistent job status records over a shared [`CacheBackend`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use procman_jobs::{InMemoryBackend, JobStatus, JobStatusRecord, JobStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), procman_jobs::JobError> {
/// let store = JobStore::new(Arc::new(InMemoryBackend::new()));
/// store.put(JobStatusRecord::new("j-1", "echo")).await?;
///
/// let record = store.update_progress("j-1", 50, None).await?;
/// assert_eq!(record.status, JobStatus::Running);
/// assert_eq!(record.progress, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn CacheBackend>,
    config: StoreConfig,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobStore {
    /// Creates a store with [`StoreConfig::default`].
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    /// Sets retention and link configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ---- Serialization helpers (private) ----

    fn key(job_id: &str) -> String {
        make_key(JOBS_NAMESPACE, job_id)
    }

    fn serialize_record(record: &JobStatusRecord) -> Result<Vec<u8>, JobError> {
        serde_json::to_vec(record).map_err(|e| JobError::Serialization {
            key: Self::key(&record.job_id),
            message: e.to_string(),
        })
    }

    fn deserialize_record(key: &str, data: &[u8]) -> Result<JobStatusRecord, JobError> {
        serde_json::from_slice(data).map_err(|e| JobError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn map_storage_error(err: StorageError, job_id: &str) -> JobError {
        match err {
            StorageError::NotFound { .. } => JobError::NotFound {
                job_id: job_id.to_string(),
            },
            other => JobError::Storage(other),
        }
    }

    // ---- Domain operations ----

    /// Writes a record, replacing any existing record with the same id.
    ///
    /// Links are filled in from the configured base path when the record
    /// has none.
    pub async fn put(&self, mut record: JobStatusRecord) -> Result<JobStatusRecord, JobError> {
        if record.links.is_empty() {
            record = record.with_links(&self.config.base_path);
        }
        let data = Self::serialize_record(&record)?;
        self.backend
            .put(&Self::key(&record.job_id), &data, self.config.retention)
            .await?;
        Ok(record)
    }

    /// Loads a record.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] if the job does not exist or has expired.
    pub async fn get(&self, job_id: &str) -> Result<JobStatusRecord, JobError> {
        let key = Self::key(job_id);
        let data = self
            .backend
            .get(&key)
            .await
            .map_err(|e| Self::map_storage_error(e, job_id))?;
        Self::deserialize_record(&key, &data)
    }

    /// Loads a record, returning `None` instead of [`JobError::NotFound`].
    pub async fn find(&self, job_id: &str) -> Result<Option<JobStatusRecord>, JobError> {
        match self.get(job_id).await {
            Ok(record) => Ok(Some(record)),
            Err(JobError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Records a progress report and moves the job to `running`.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] if the job does not exist.
    /// - [`JobError::InvalidTransition`] if the job is already terminal.
    pub async fn update_progress(
        &self,
        job_id: &str,
        percent: u8,
        message: Option<String>,
    ) -> Result<JobStatusRecord, JobError> {
        let mut record = self.get(job_id).await?;
        record.apply_progress(percent, message)?;
        self.put(record).await
    }

    /// Marks a job `successful`.
    ///
    /// A missing record is created on the fly so that a completion is never
    /// lost, for example when the record expired while the job ran.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub async fn complete(
        &self,
        job_id: &str,
        process_id: &str,
        result: JobResult,
        message: Option<String>,
    ) -> Result<JobStatusRecord, JobError> {
        let mut record = self.load_or_new(job_id, process_id).await?;
        if let JobResult::Cached { fingerprint } = &result {
            record.fingerprint.get_or_insert_with(|| fingerprint.clone());
        }
        record.complete(result, message)?;
        tracing::debug!(job_id, process_id, "job completed");
        self.put(record).await
    }

    /// Marks a job `failed` with the given message.
    ///
    /// A missing record is created on the fly, as for
    /// [`complete`](Self::complete).
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub async fn fail(
        &self,
        job_id: &str,
        process_id: &str,
        message: impl Into<String>,
    ) -> Result<JobStatusRecord, JobError> {
        let mut record = self.load_or_new(job_id, process_id).await?;
        record.fail(message)?;
        tracing::debug!(job_id, process_id, "job failed");
        self.put(record).await
    }

    /// Removes a record. Returns `true` if it existed.
    pub async fn delete(&self, job_id: &str) -> Result<bool, JobError> {
        Ok(self.backend.delete(&Self::key(job_id)).await?)
    }

    /// Physically removes expired entries from the backend.
    ///
    /// The backend is shared with the result cache and the registry, so
    /// their expired entries go too. Delegates to
    /// [`CacheBackend::cleanup_expired`].
    pub async fn cleanup_expired(&self) -> Result<usize, JobError> {
        Ok(self.backend.cleanup_expired().await?)
    }

    /// Ids of every live job, without the namespace prefix.
    pub async fn job_ids(&self) -> Result<Vec<String>, JobError> {
        let keys = self.backend.keys(&make_prefix(JOBS_NAMESPACE)).await?;
        Ok(keys
            .iter()
            .filter_map(|key| strip_namespace(JOBS_NAMESPACE, key))
            .map(str::to_string)
            .collect())
    }

    /// Lists jobs newest first, ties broken by job id.
    ///
    /// Records that vanish or fail to decode between enumeration and load
    /// are skipped.
    pub async fn list(&self, options: ListJobsOptions) -> Result<Page<JobStatusRecord>, JobError> {
        let ids = self.job_ids().await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get(id).await {
                Ok(record) => records.push(record),
                Err(JobError::NotFound { .. }) => {},
                Err(JobError::Serialization { key, message }) => {
                    tracing::warn!(%key, %message, "skipping undecodable job record");
                },
                Err(e) => return Err(e),
            }
        }
        records.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(Page::from_vec(records, options.offset, options.limit))
    }

    async fn load_or_new(&self, job_id: &str, process_id: &str) -> Result<JobStatusRecord, JobError> {
        match self.find(job_id).await? {
            Some(record) => Ok(record),
            None => {
                tracing::warn!(job_id, "job record missing at completion, recreating");
                Ok(JobStatusRecord::new(job_id, process_id))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobStatus;
    use crate::store::memory::InMemoryBackend;
    use serde_json::json;

    fn store() -> JobStore {
        JobStore::new(Arc::new(InMemoryBackend::new()))
    }

    #[tokio::test]
    async fn put_fills_links_from_base_path() {
        let store = store().with_config(StoreConfig {
            base_path: "/api".to_string(),
            ..StoreConfig::default()
        });
        let record = store.put(JobStatusRecord::new("j-1", "echo")).await.unwrap();
        assert_eq!(record.links[0].href, "/api/jobs/j-1");
        assert_eq!(store.get("j-1").await.unwrap().links, record.links);
    }

    #[tokio::test]
    async fn cleanup_expired_drops_stale_records() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = JobStore::new(backend.clone()).with_config(StoreConfig {
            retention: Some(std::time::Duration::from_millis(10)),
            ..StoreConfig::default()
        });
        store.put(JobStatusRecord::new("j-1", "echo")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        assert_eq!(backend.len(), 1);
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn complete_upserts_missing_record() {
        let store = store();
        let record = store
            .complete(
                "ghost",
                "echo",
                JobResult::Cached {
                    fingerprint: "f00".to_string(),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Successful);
        assert_eq!(record.fingerprint.as_deref(), Some("f00"));
        assert_eq!(record.progress, 100);
    }

    #[tokio::test]
    async fn progress_on_missing_job_is_not_found() {
        let err = store().update_progress("nope", 10, None).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound { job_id } if job_id == "nope"));
    }

    #[tokio::test]
    async fn corrupt_records_surface_serialization_errors() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.put("job:bad", b"not json", None).await.unwrap();
        let store = JobStore::new(backend);

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, JobError::Serialization { ref key, .. } if key == "job:bad"));

        let page = store.list(ListJobsOptions::default()).await.unwrap();
        assert!(page.items.is_empty());
    }
}
