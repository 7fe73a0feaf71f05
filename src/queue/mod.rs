//! Task queue contract.
//!
//! The orchestrator hands asynchronous work to a [`TaskQueue`] and later
//! polls it by task id. Queue-side execution is done by a [`TaskHandler`],
//! normally the [`Worker`](crate::Worker).
//!
//! [`LocalTaskQueue`] runs tasks on the current tokio runtime. Other queue
//! technologies plug in by implementing [`TaskQueue`] and calling a
//! [`TaskHandler`] on their consumer side.

mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

pub use local::LocalTaskQueue;

/// Runs a process and memoizes its result.
///
/// Arguments: `{"process_id", "inputs", "fingerprint", "outputs"?}`. The
/// task id is the job id.
pub const EXECUTE_PROCESS: &str = "execute_process";

/// Looks up a memoized result. Arguments: `{"fingerprint"}`.
pub const FIND_RESULT_IN_CACHE: &str = "find_result_in_cache";

/// Memoizes a result. Arguments: `{"fingerprint", "result"}`.
pub const STORE_RESULT: &str = "store_result";

/// What the queue knows about a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting to run, or unknown to the queue.
    Pending,
    /// Picked up by a worker.
    Running,
    /// Finished with a value.
    Success {
        /// The task's return value.
        value: Value,
    },
    /// Finished with an error.
    Failure {
        /// The error message.
        message: String,
    },
}

impl TaskState {
    /// Returns `true` for `Success` and `Failure`.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }
}

/// Asynchronous task submission and retrieval.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueues `task_name` with `args` under a fresh task id and returns
    /// the id.
    async fn submit(&self, task_name: &str, args: Value) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        self.submit_as(&task_id, task_name, args).await?;
        Ok(task_id)
    }

    /// Enqueues `task_name` with `args` under the caller's `task_id`.
    ///
    /// Lets the caller persist state keyed by the id before the task can
    /// start.
    async fn submit_as(&self, task_id: &str, task_name: &str, args: Value) -> Result<()>;

    /// Non-blocking state lookup. Unknown ids report [`TaskState::Pending`].
    async fn fetch(&self, task_id: &str) -> Result<TaskState>;

    /// Drops the task's state and cancels it if it has not finished.
    /// Best effort: the cancellation is not awaited.
    async fn forget(&self, task_id: &str) -> Result<()>;
}

/// Queue-side executor for named tasks.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Runs `task_name` with `args` on behalf of task `task_id`.
    async fn handle(&self, task_id: &str, task_name: &str, args: Value) -> Result<Value>;
}
