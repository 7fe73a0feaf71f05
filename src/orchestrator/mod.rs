//! Execution orchestrator.
//!
//! [`ProcessManager`] is the single entry point for running a process. A
//! call to [`execute`](ProcessManager::execute) goes through these steps in
//! order and stops at the first failure:
//!
//! 1. resolve the process in the registry
//! 2. validate the inputs
//! 3. validate the output selection
//! 4. fingerprint the inputs and check the result cache
//! 5. on a miss, dispatch with the negotiated [`ExecutionStrategy`]
//!
//! A cache hit still mints a fresh job id and records a terminal
//! `successful` job, so callers that always poll by job id see a uniform
//! view.
//!
//! Store calls are bounded by `store_timeout`, the cache-hit check by the
//! shorter `cache_check_timeout`, and queue calls by `queue_timeout`. The
//! orchestrator never retries.

mod builder;
pub mod shaping;
mod strategy;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use procman_jobs::{
    JobError, JobResult, JobStatus, JobStatusRecord, JobStore, ListJobsOptions, Page, ResultCache,
};
use serde_json::Value;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::fingerprint::CalculationTask;
use crate::queue::{TaskQueue, TaskState};
use crate::registry::ProcessRegistry;
use crate::types::{
    ExecuteResponse, ExecutionRequest, ProcessDescriptor, ProcessSummary, ResultShaping,
};
use crate::worker::{Worker, CACHE_HIT_MESSAGE, COMPLETED_MESSAGE};

pub use builder::ProcessManagerBuilder;
pub use strategy::ExecutionStrategy;

/// Runs processes, memoizes their results and tracks their jobs.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
///
/// # Examples
///
/// ```
/// use procman::process::SyncProcess;
/// use procman::types::{ExecutionRequest, InputDescription, OutputDescription, ProcessDescriptor, Schema};
/// use procman::ProcessManager;
/// use serde_json::{json, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> procman::Result<()> {
/// let uppercase = SyncProcess::new(
///     ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
///         .with_input("text", InputDescription::new(Schema::string()))
///         .with_output("result", OutputDescription::new(Schema::string())),
///     |inputs| {
///         let text = inputs.get("text").and_then(Value::as_str).unwrap_or_default();
///         Ok(json!({"result": text.to_uppercase()}))
///     },
/// );
/// let manager = ProcessManager::builder()
///     .process("uppercase", uppercase)
///     .build()
///     .await?;
///
/// let response = manager
///     .execute("uppercase", ExecutionRequest::sync(json!({"text": "abc"})))
///     .await?;
/// assert_eq!(response.value, Some(json!({"outputs": {"result": "ABC"}})));
/// # Ok(())
/// # }
/// ```
pub struct ProcessManager {
    config: ServiceConfig,
    registry: Arc<ProcessRegistry>,
    jobs: JobStore,
    results: ResultCache,
    queue: Arc<dyn TaskQueue>,
    worker: Worker,
}

impl std::fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ProcessManager {
    /// Starts building a manager.
    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    /// The active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The process registry.
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// The job status store.
    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// The result cache.
    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    /// The queue worker sharing this manager's registry and stores.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Runs `process_id` with `request`.
    ///
    /// # Errors
    ///
    /// - [`Error::ProcessNotFound`] if the process is not registered.
    /// - [`Error::InputValidation`] / [`Error::OutputValidation`] for a
    ///   request that does not match the process contract.
    /// - [`Error::JobFailed`] if a synchronous execution fails; the failed
    ///   job is recorded under the carried id.
    /// - [`Error::CacheUnavailable`] / [`Error::QueueUnavailable`] if a
    ///   collaborator fails or exceeds its time bound.
    pub async fn execute(
        &self,
        process_id: &str,
        request: ExecutionRequest,
    ) -> Result<ExecuteResponse> {
        let process = self
            .registry_call("process resolution", self.registry.resolve(process_id))
            .await?;
        let descriptor = process.description().ok_or_else(|| {
            Error::Internal(format!("registered process {process_id} lost its description"))
        })?;

        process.validate_inputs(&request.inputs).await?;
        process.validate_outputs(request.outputs.as_ref()).await?;

        let task = CalculationTask::new(process_id, request);
        if let Some(response) = self.answer_from_cache(&task).await? {
            return Ok(response);
        }
        tracing::debug!(process_id, fingerprint = task.fingerprint(), "cache miss");

        let mode = descriptor.negotiate(task.request.mode);
        if mode != task.request.mode {
            tracing::debug!(process_id, requested = ?task.request.mode, used = ?mode, "execution mode negotiated");
        }
        ExecutionStrategy::for_mode(mode)
            .dispatch(self, process, &task)
            .await
    }

    async fn answer_from_cache(&self, task: &CalculationTask) -> Result<Option<ExecuteResponse>> {
        let fingerprint = task.fingerprint();
        let hit = bounded(
            self.config.cache_check_timeout(),
            async { self.results.contains(fingerprint).await.map_err(|e| Error::from_store(e, "cache check")) },
            || Error::cache_timeout("cache check"),
        )
        .await?;
        if !hit {
            return Ok(None);
        }
        // The entry may expire between the check and the read.
        let Some(value) = self
            .store_call("cached result lookup", self.results.get(fingerprint))
            .await?
        else {
            return Ok(None);
        };

        let job_id = Uuid::new_v4().to_string();
        let mut record = self.new_record(&job_id, task)?;
        record.complete(
            JobResult::Cached {
                fingerprint: fingerprint.to_string(),
            },
            Some(CACHE_HIT_MESSAGE.to_string()),
        )?;
        let record = self.store_call("job creation", self.jobs.put(record)).await?;
        tracing::info!(%job_id, process_id = %task.process_id, fingerprint, "cache hit");

        let shaped = self.shape(&value, &task.request.shaping(), &job_id);
        Ok(Some(ExecuteResponse::from_record(&record, Some(shaped))))
    }

    /// The description of the latest registered version of `process_id`.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] if it is not registered.
    pub async fn get_process_description(&self, process_id: &str) -> Result<ProcessDescriptor> {
        self.registry_call("process description", self.registry.describe(process_id))
            .await
    }

    /// One page of process summaries, in id order.
    ///
    /// `limit` defaults to `default_page_limit` and is clamped to
    /// `[1, max_page_limit]`.
    pub async fn list_processes(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Page<ProcessSummary>> {
        let ids = self
            .registry_call("process listing", self.registry.list_ids())
            .await?;
        let page = Page::from_vec(ids, offset, self.config.page_limit(limit));

        let mut items = Vec::with_capacity(page.items.len());
        for id in &page.items {
            match self
                .registry_call("process description", self.registry.describe(id))
                .await
            {
                Ok(descriptor) => {
                    items.push(ProcessSummary::from_descriptor(&descriptor, &self.config.base_path));
                },
                Err(Error::ProcessNotFound { .. }) => {
                    tracing::debug!(process_id = %id, "process vanished during listing");
                },
                Err(e) => return Err(e),
            }
        }
        Ok(Page {
            items,
            total: page.total,
            next: page.next,
        })
    }

    /// The status of a job, reconciled with the task queue.
    ///
    /// A non-terminal record is compared with the queue's view. If the
    /// queue reports the task finished, the record is healed to the
    /// matching terminal state and persisted.
    ///
    /// # Errors
    ///
    /// [`Error::JobNotFound`] if no record exists.
    pub async fn get_job_status(&self, job_id: &str) -> Result<JobStatusRecord> {
        let mut record = self.store_call("job lookup", self.jobs.get(job_id)).await?;
        if record.is_terminal() {
            return Ok(record);
        }

        let state = match self.queue_call("fetch", self.queue.fetch(job_id)).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "queue unavailable, returning stored status");
                return Ok(record);
            },
        };

        match state {
            TaskState::Pending => Ok(record),
            TaskState::Running => {
                if record.status == JobStatus::Accepted {
                    record.apply_progress(record.progress, None)?;
                }
                Ok(record)
            },
            TaskState::Success { value } => {
                let memoized = match &record.fingerprint {
                    Some(fingerprint) => {
                        self.store_call("cache check", self.results.contains(fingerprint))
                            .await?
                    },
                    None => false,
                };
                let result = match record.fingerprint.clone() {
                    Some(fingerprint) if memoized => JobResult::Cached { fingerprint },
                    _ => JobResult::Value { value },
                };
                record.complete(result, Some(COMPLETED_MESSAGE.to_string()))?;
                tracing::info!(job_id, "healed job record to successful from queue state");
                self.store_call("job update", self.jobs.put(record)).await
            },
            TaskState::Failure { message } => {
                record.fail(message)?;
                tracing::info!(job_id, "healed job record to failed from queue state");
                self.store_call("job update", self.jobs.put(record)).await
            },
        }
    }

    /// The shaped result of a job.
    ///
    /// # Errors
    ///
    /// - [`Error::JobNotFound`] if no record exists.
    /// - [`Error::JobFailed`] if the job failed.
    /// - [`Error::JobNotReady`] if the job has not finished.
    pub async fn get_job_result(&self, job_id: &str) -> Result<Value> {
        let record = self.get_job_status(job_id).await?;
        match record.status {
            JobStatus::Failed => {
                return Err(Error::JobFailed {
                    job_id: job_id.to_string(),
                    message: record.message.clone().unwrap_or_default(),
                })
            },
            JobStatus::Dismissed => {
                return Err(Error::JobNotFound {
                    job_id: job_id.to_string(),
                })
            },
            _ => {},
        }

        let shaping = stored_shaping(&record);
        match &record.result {
            Some(JobResult::Value { value }) => return Ok(self.shape(value, &shaping, job_id)),
            Some(JobResult::Cached { fingerprint }) => {
                if let Some(value) = self
                    .store_call("cached result lookup", self.results.get(fingerprint))
                    .await?
                {
                    return Ok(self.shape(&value, &shaping, job_id));
                }
                tracing::debug!(job_id, %fingerprint, "cached result expired, asking the queue");
            },
            None => {},
        }

        match self.queue_call("fetch", self.queue.fetch(job_id)).await? {
            TaskState::Success { value } => Ok(self.shape(&value, &shaping, job_id)),
            TaskState::Failure { message } => Err(Error::JobFailed {
                job_id: job_id.to_string(),
                message,
            }),
            TaskState::Pending | TaskState::Running if record.status == JobStatus::Successful => {
                Err(Error::Internal(format!("result of job {job_id} is no longer available")))
            },
            TaskState::Pending | TaskState::Running => Err(Error::JobNotReady {
                job_id: job_id.to_string(),
                status: record.status.to_string(),
            }),
        }
    }

    /// Deletes a job and best-effort cancels its queued task.
    ///
    /// Returns the record as it stood, marked `dismissed`.
    ///
    /// # Errors
    ///
    /// [`Error::JobNotFound`] if no record exists.
    pub async fn delete_job(&self, job_id: &str) -> Result<JobStatusRecord> {
        let mut record = self.store_call("job lookup", self.jobs.get(job_id)).await?;
        if record.status != JobStatus::Dismissed {
            record.dismiss()?;
        }
        self.store_call("job deletion", self.jobs.delete(job_id))
            .await?;
        if let Err(e) = self.queue_call("forget", self.queue.forget(job_id)).await {
            tracing::warn!(job_id, error = %e, "could not forget queued task");
        }
        tracing::info!(job_id, "job dismissed");
        Ok(record)
    }

    /// One page of jobs, newest first.
    ///
    /// `limit` defaults to `default_page_limit` and is clamped to
    /// `[1, max_page_limit]`.
    pub async fn list_jobs(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Page<JobStatusRecord>> {
        let options = ListJobsOptions {
            offset,
            limit: self.config.page_limit(limit),
        };
        self.store_call("job listing", self.jobs.list(options)).await
    }

    /// Physically removes expired job records, memoized results and other
    /// expired entries from the shared backend. Returns how many went.
    ///
    /// The in-memory backend also sweeps on its own as it is written to;
    /// this is for hosts that want to reclaim memory on a schedule.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let removed = self
            .store_call("cleanup", self.jobs.cleanup_expired())
            .await?;
        tracing::debug!(removed, "cleaned up expired entries");
        Ok(removed)
    }

    // ---- helpers shared with the strategies ----

    pub(crate) fn new_record(&self, job_id: &str, task: &CalculationTask) -> Result<JobStatusRecord> {
        let shaping = serde_json::to_value(task.request.shaping())?;
        Ok(JobStatusRecord::new(job_id, &task.process_id)
            .with_fingerprint(task.fingerprint())
            .with_request_options(Some(shaping)))
    }

    pub(crate) fn shape(&self, value: &Value, shaping: &ResultShaping, job_id: &str) -> Value {
        shaping::shape(value, shaping, job_id, &self.config.base_path)
    }

    pub(crate) async fn store_call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, JobError>>,
    {
        bounded(
            self.config.store_timeout(),
            async { call.await.map_err(|e| Error::from_store(e, operation)) },
            || Error::cache_timeout(operation),
        )
        .await
    }

    pub(crate) async fn queue_call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.config.queue_timeout(), call, || Error::queue_timeout(operation)).await
    }

    async fn registry_call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(self.config.store_timeout(), call, || Error::cache_timeout(operation)).await
    }
}

async fn bounded<T, F>(limit: Duration, call: F, on_timeout: impl FnOnce() -> Error) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(on_timeout()))
}

fn stored_shaping(record: &JobStatusRecord) -> ResultShaping {
    let Some(options) = &record.request_options else {
        return ResultShaping::default();
    };
    serde_json::from_value(options.clone()).unwrap_or_else(|e| {
        tracing::warn!(job_id = %record.job_id, error = %e, "unreadable result shaping, using defaults");
        ResultShaping::default()
    })
}
