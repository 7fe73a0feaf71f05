//! Sync and async dispatch of a cache miss.

use std::sync::Arc;

use uuid::Uuid;

use super::ProcessManager;
use crate::error::{Error, Result};
use crate::fingerprint::CalculationTask;
use crate::process::Process;
use crate::queue::EXECUTE_PROCESS;
use crate::types::{ExecuteResponse, ExecutionMode};
use crate::worker::ExecuteArgs;

/// How a cache miss is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Run in the caller's task and answer with the result.
    Sync,
    /// Submit to the task queue and answer with the job id.
    Async,
}

impl ExecutionStrategy {
    /// The strategy for an (already negotiated) execution mode.
    pub fn for_mode(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Sync => Self::Sync,
            ExecutionMode::Async => Self::Async,
        }
    }

    /// The execution mode this strategy implements.
    pub fn mode(self) -> ExecutionMode {
        match self {
            Self::Sync => ExecutionMode::Sync,
            Self::Async => ExecutionMode::Async,
        }
    }

    pub(crate) async fn dispatch(
        self,
        manager: &ProcessManager,
        process: Arc<dyn Process>,
        task: &CalculationTask,
    ) -> Result<ExecuteResponse> {
        match self {
            Self::Sync => run_sync(manager, process, task).await,
            Self::Async => submit_async(manager, task).await,
        }
    }
}

fn execute_args(task: &CalculationTask) -> ExecuteArgs {
    ExecuteArgs {
        process_id: task.process_id.clone(),
        inputs: task.request.inputs.as_object().cloned().unwrap_or_default(),
        fingerprint: task.fingerprint().to_string(),
        outputs: task.request.outputs.clone(),
    }
}

async fn run_sync(
    manager: &ProcessManager,
    process: Arc<dyn Process>,
    task: &CalculationTask,
) -> Result<ExecuteResponse> {
    let job_id = Uuid::new_v4().to_string();
    let record = manager.new_record(&job_id, task)?;
    manager
        .store_call("job creation", manager.jobs.put(record))
        .await?;
    tracing::info!(%job_id, process_id = %task.process_id, "executing synchronously");

    let value = manager
        .worker
        .execute_inline(&job_id, process, execute_args(task))
        .await
        .map_err(|e| Error::JobFailed {
            job_id: job_id.clone(),
            message: e.to_string(),
        })?;

    let record = manager
        .store_call("job lookup", manager.jobs.get(&job_id))
        .await?;
    let shaped = manager.shape(&value, &task.request.shaping(), &job_id);
    Ok(ExecuteResponse::from_record(&record, Some(shaped)))
}

async fn submit_async(manager: &ProcessManager, task: &CalculationTask) -> Result<ExecuteResponse> {
    let job_id = Uuid::new_v4().to_string();
    // The record must exist before the task can run: the worker's progress
    // and terminal writes update it in place.
    let record = manager
        .new_record(&job_id, task)?
        .with_links(&manager.config.base_path);
    let record = manager
        .store_call("job creation", manager.jobs.put(record))
        .await?;

    let args = serde_json::to_value(execute_args(task))?;
    let submitted = manager
        .queue_call(
            "submit",
            manager.queue.submit_as(&job_id, EXECUTE_PROCESS, args),
        )
        .await;
    if let Err(e) = submitted {
        if let Err(cleanup) = manager.jobs.delete(&job_id).await {
            tracing::warn!(%job_id, error = %cleanup, "could not remove job record of failed submission");
        }
        return Err(e);
    }

    tracing::info!(%job_id, process_id = %task.process_id, "submitted to queue");
    Ok(ExecuteResponse::from_record(&record, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_follow_modes() {
        for mode in [ExecutionMode::Sync, ExecutionMode::Async] {
            assert_eq!(ExecutionStrategy::for_mode(mode).mode(), mode);
        }
    }

    #[test]
    fn args_carry_fingerprint_and_selection() {
        use crate::types::{ExecutionRequest, OutputSelection};
        use serde_json::json;

        let task = CalculationTask::new(
            "uppercase",
            ExecutionRequest::new(json!({"text": "abc"}))
                .with_outputs(OutputSelection::from_names(["result"])),
        );
        let args = execute_args(&task);
        assert_eq!(args.fingerprint, task.fingerprint());
        assert_eq!(args.inputs["text"], json!("abc"));
        assert!(args.outputs.is_some());
    }
}
