//! Queue-side execution of process tasks.
//!
//! The [`Worker`] is the [`TaskHandler`] behind the task queue. For
//! [`EXECUTE_PROCESS`] it consults the result cache, runs the process while
//! persisting its progress reports, memoizes the result under the input
//! fingerprint and writes the terminal job state. All progress reports are
//! persisted before the terminal write.

use std::sync::Arc;

use async_trait::async_trait;
use procman_jobs::{JobResult, JobStore, ResultCache};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::process::{Process, ProgressSink, ProgressUpdate};
use crate::queue::{TaskHandler, EXECUTE_PROCESS, FIND_RESULT_IN_CACHE, STORE_RESULT};
use crate::registry::ProcessRegistry;
use crate::types::OutputSelection;

/// Message recorded on jobs answered from the result cache.
pub const CACHE_HIT_MESSAGE: &str = "Result retrieved from cache";

/// Message recorded on jobs that ran to completion.
pub const COMPLETED_MESSAGE: &str = "Process completed";

/// How a completed result is recorded on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recording {
    /// A reference to the memoized result.
    Reference,
    /// The value itself.
    Inline,
}

/// Arguments of an [`EXECUTE_PROCESS`] task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteArgs {
    /// Process to run.
    pub process_id: String,
    /// Input values.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Fingerprint of `inputs`.
    pub fingerprint: String,
    /// Requested outputs, passed through to the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputSelection>,
}

#[derive(Debug, Deserialize)]
struct FindArgs {
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct StoreArgs {
    fingerprint: String,
    result: Value,
}

/// Executes process tasks against a registry, result cache and job store.
#[derive(Debug, Clone)]
pub struct Worker {
    registry: Arc<ProcessRegistry>,
    results: ResultCache,
    jobs: JobStore,
}

impl Worker {
    /// A worker sharing the given registry and stores.
    pub fn new(registry: Arc<ProcessRegistry>, results: ResultCache, jobs: JobStore) -> Self {
        Self {
            registry,
            results,
            jobs,
        }
    }

    /// Runs one process invocation as job `job_id` and returns its outputs.
    ///
    /// The result cache is consulted first. On completion the result is
    /// memoized and the job record points at it.
    ///
    /// # Errors
    ///
    /// Resolution and execution errors are returned after the job has been
    /// marked `failed`.
    pub async fn execute_process(&self, job_id: &str, args: ExecuteArgs) -> Result<Value> {
        match self.results.get(&args.fingerprint).await {
            Ok(Some(value)) => {
                tracing::info!(
                    job_id,
                    process_id = %args.process_id,
                    fingerprint = %args.fingerprint,
                    "cache hit in worker"
                );
                self.jobs
                    .complete(
                        job_id,
                        &args.process_id,
                        JobResult::Cached {
                            fingerprint: args.fingerprint,
                        },
                        Some(CACHE_HIT_MESSAGE.to_string()),
                    )
                    .await?;
                return Ok(value);
            },
            Ok(None) => {},
            Err(e) => tracing::warn!(job_id, error = %e, "result cache lookup failed, executing"),
        }

        let process = match self.registry.resolve(&args.process_id).await {
            Ok(process) => process,
            Err(e) => return Err(self.record_failure(job_id, &args.process_id, e).await),
        };
        self.execute_with(job_id, process, args, Recording::Reference)
            .await
    }

    /// Runs `process` as job `job_id` in the caller's task, recording the
    /// result inline on the job. The result is still memoized.
    pub(crate) async fn execute_inline(
        &self,
        job_id: &str,
        process: Arc<dyn Process>,
        args: ExecuteArgs,
    ) -> Result<Value> {
        self.execute_with(job_id, process, args, Recording::Inline)
            .await
    }

    async fn execute_with(
        &self,
        job_id: &str,
        process: Arc<dyn Process>,
        args: ExecuteArgs,
        recording: Recording,
    ) -> Result<Value> {
        let ExecuteArgs {
            process_id,
            inputs,
            fingerprint,
            outputs,
        } = args;

        let outcome = self
            .run(job_id, process.as_ref(), &inputs, outputs.as_ref())
            .await;
        let value = match outcome {
            Ok(value) => value,
            Err(e) => return Err(self.record_failure(job_id, &process_id, e).await),
        };

        let memoized = match self.results.put(&fingerprint, &value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "could not memoize result");
                false
            },
        };
        let result = match recording {
            Recording::Reference if memoized => JobResult::Cached { fingerprint },
            _ => JobResult::Value {
                value: value.clone(),
            },
        };
        self.jobs
            .complete(job_id, &process_id, result, Some(COMPLETED_MESSAGE.to_string()))
            .await?;
        tracing::info!(job_id, %process_id, "process completed");
        Ok(value)
    }

    async fn record_failure(&self, job_id: &str, process_id: &str, error: Error) -> Error {
        tracing::warn!(job_id, process_id, %error, "process failed");
        if let Err(store_err) = self.jobs.fail(job_id, process_id, error.to_string()).await {
            tracing::error!(job_id, error = %store_err, "could not record failure");
        }
        error
    }

    async fn run(
        &self,
        job_id: &str,
        process: &dyn Process,
        inputs: &Map<String, Value>,
        outputs: Option<&OutputSelection>,
    ) -> Result<Value> {
        let (sink, mut updates) = ProgressSink::channel();

        let execution = process.execute(inputs, outputs, Some(sink));
        tokio::pin!(execution);

        let outcome = loop {
            tokio::select! {
                outcome = &mut execution => break outcome,
                Some(update) = updates.recv() => self.record_progress(job_id, update).await,
            }
        };

        // Reports sent just before returning are still queued.
        while let Ok(update) = updates.try_recv() {
            self.record_progress(job_id, update).await;
        }
        outcome
    }

    async fn record_progress(&self, job_id: &str, update: ProgressUpdate) {
        let ProgressUpdate {
            percent,
            message,
            status,
        } = update;
        if let Some(status) = status {
            tracing::trace!(job_id, %status, "progress status hint");
        }
        match self.jobs.update_progress(job_id, percent, message).await {
            Ok(_) => tracing::debug!(job_id, percent, "progress recorded"),
            Err(procman_jobs::JobError::NotFound { .. }) => {
                tracing::debug!(job_id, "no job record for progress report, skipping");
            },
            Err(e) => tracing::warn!(job_id, error = %e, "could not record progress"),
        }
    }

    /// Looks up a memoized result. `null` when absent.
    pub async fn find_result(&self, fingerprint: &str) -> Result<Value> {
        Ok(self
            .results
            .get(fingerprint)
            .await
            .map_err(|e| Error::from_store(e, "result lookup"))?
            .unwrap_or(Value::Null))
    }

    /// Memoizes `result` under `fingerprint`.
    pub async fn store_result(&self, fingerprint: &str, result: &Value) -> Result<Value> {
        self.results
            .put(fingerprint, result)
            .await
            .map_err(|e| Error::from_store(e, "result store"))?;
        Ok(json!({ "fingerprint": fingerprint }))
    }
}

#[async_trait]
impl TaskHandler for Worker {
    async fn handle(&self, task_id: &str, task_name: &str, args: Value) -> Result<Value> {
        match task_name {
            EXECUTE_PROCESS => {
                let args: ExecuteArgs = serde_json::from_value(args)?;
                self.execute_process(task_id, args).await
            },
            FIND_RESULT_IN_CACHE => {
                let args: FindArgs = serde_json::from_value(args)?;
                self.find_result(&args.fingerprint).await
            },
            STORE_RESULT => {
                let args: StoreArgs = serde_json::from_value(args)?;
                self.store_result(&args.fingerprint, &args.result).await
            },
            other => Err(Error::Internal(format!("unknown task '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutputDescription, ProcessDescriptor, Schema};
    use procman_jobs::{CacheBackend, InMemoryBackend, JobStatus, JobStatusRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Process for Counting {
        fn description(&self) -> Option<ProcessDescriptor> {
            Some(
                ProcessDescriptor::new("count", "1.0.0", "Count")
                    .with_output("n", OutputDescription::new(Schema::default())),
            )
        }

        async fn execute(
            &self,
            _inputs: &Map<String, Value>,
            _outputs: Option<&OutputSelection>,
            progress: Option<ProgressSink>,
        ) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = progress {
                progress.report(50, "halfway")?;
                progress.report(90, "almost")?;
            }
            if self.fail {
                return Err(Error::execution("deliberate"));
            }
            Ok(json!({ "n": n }))
        }
    }

    async fn worker(fail: bool) -> (Worker, Arc<Counting>) {
        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryBackend::new());
        let registry = Arc::new(ProcessRegistry::new(Arc::clone(&backend)));
        let process = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        });
        registry.register("count", Arc::clone(&process)).await.unwrap();
        let worker = Worker::new(
            registry,
            ResultCache::new(Arc::clone(&backend)),
            JobStore::new(backend),
        );
        (worker, process)
    }

    fn args(fingerprint: &str) -> ExecuteArgs {
        ExecuteArgs {
            process_id: "count".to_string(),
            inputs: Map::new(),
            fingerprint: fingerprint.to_string(),
            outputs: None,
        }
    }

    #[tokio::test]
    async fn execution_memoizes_and_completes_the_job() {
        let (worker, process) = worker(false).await;
        worker.jobs.put(JobStatusRecord::new("j1", "count")).await.unwrap();

        let value = worker.execute_process("j1", args("fp")).await.unwrap();
        assert_eq!(value, json!({"n": 1}));

        let record = worker.jobs.get("j1").await.unwrap();
        assert_eq!(record.status, JobStatus::Successful);
        assert_eq!(record.progress, 100);
        assert_eq!(
            record.result,
            Some(JobResult::Cached {
                fingerprint: "fp".to_string()
            })
        );
        assert_eq!(worker.results.get("fp").await.unwrap(), Some(json!({"n": 1})));

        // Second run with the same fingerprint is served from the cache.
        let again = worker.execute_process("j2", args("fp")).await.unwrap();
        assert_eq!(again, json!({"n": 1}));
        assert_eq!(process.calls.load(Ordering::SeqCst), 1);
        let record = worker.jobs.get("j2").await.unwrap();
        assert_eq!(record.message.as_deref(), Some(CACHE_HIT_MESSAGE));
    }

    #[tokio::test]
    async fn failures_are_recorded() {
        let (worker, _) = worker(true).await;
        worker.jobs.put(JobStatusRecord::new("j1", "count")).await.unwrap();

        let err = worker.execute_process("j1", args("fp")).await.unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));

        let record = worker.jobs.get("j1").await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        // Progress reported before the failure is kept.
        assert_eq!(record.progress, 90);
        assert!(record.message.unwrap().contains("deliberate"));
        assert!(worker.results.get("fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_dispatches_cache_tasks() {
        let (worker, _) = worker(false).await;
        let stored = worker
            .handle("t1", STORE_RESULT, json!({"fingerprint": "abc", "result": {"n": 5}}))
            .await
            .unwrap();
        assert_eq!(stored, json!({"fingerprint": "abc"}));

        let found = worker
            .handle("t2", FIND_RESULT_IN_CACHE, json!({"fingerprint": "abc"}))
            .await
            .unwrap();
        assert_eq!(found, json!({"n": 5}));

        let missing = worker
            .handle("t3", FIND_RESULT_IN_CACHE, json!({"fingerprint": "zzz"}))
            .await
            .unwrap();
        assert_eq!(missing, Value::Null);

        assert!(worker.handle("t4", "bogus", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn inline_execution_records_the_value() {
        let (worker, process) = worker(false).await;
        let value = worker
            .execute_inline("j1", process, args("fp"))
            .await
            .unwrap();
        let record = worker.jobs.get("j1").await.unwrap();
        assert_eq!(record.result, Some(JobResult::Value { value }));
        assert!(worker.results.contains("fp").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_process_fails_the_job() {
        let (worker, _) = worker(false).await;
        let mut missing = args("fp");
        missing.process_id = "ghost".to_string();
        let err = worker.execute_process("j9", missing).await.unwrap_err();
        assert!(matches!(err, Error::ProcessNotFound { .. }));
        assert_eq!(worker.jobs.get("j9").await.unwrap().status, JobStatus::Failed);
    }
}
