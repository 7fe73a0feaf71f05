//! In-process task queue on the tokio runtime.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::AbortHandle;

use super::{TaskHandler, TaskQueue, TaskState};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct TaskEntry {
    state: TaskState,
    finished: Option<Instant>,
}

impl TaskEntry {
    fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            finished: None,
        }
    }

    fn finish(&mut self, state: TaskState) {
        self.state = state;
        self.finished = Some(Instant::now());
    }

    fn is_stale(&self, now: Instant, retention: Duration) -> bool {
        self.finished
            .is_some_and(|at| now.saturating_duration_since(at) >= retention)
    }
}

/// Runs submitted tasks as tokio tasks, at most `concurrency` at a time.
///
/// The state of a finished task is kept for the retention window, then
/// evicted on a later submission (or by [`evict_finished`](Self::evict_finished)).
/// Without a retention window it is kept until
/// [`forget`](TaskQueue::forget). Must be used from within a tokio runtime.
pub struct LocalTaskQueue {
    handler: Arc<dyn TaskHandler>,
    states: Arc<DashMap<String, TaskEntry>>,
    running: Arc<DashMap<String, AbortHandle>>,
    permits: Arc<Semaphore>,
    retention: Option<Duration>,
}

impl fmt::Debug for LocalTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTaskQueue")
            .field("tasks", &self.states.len())
            .field("running", &self.running.len())
            .field("available_permits", &self.permits.available_permits())
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl LocalTaskQueue {
    /// A queue dispatching to `handler` with `concurrency` workers.
    ///
    /// A concurrency of zero is raised to one. Finished task states are
    /// kept until forgotten; see [`with_retention`](Self::with_retention).
    pub fn new(handler: Arc<dyn TaskHandler>, concurrency: usize) -> Self {
        Self {
            handler,
            states: Arc::new(DashMap::new()),
            running: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            retention: None,
        }
    }

    /// Evicts finished task states once they are older than `retention`
    /// (builder pattern). `None` keeps them until forgotten.
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// Number of tasks whose state is retained.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no task state is retained.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops the states of tasks that finished longer than the retention
    /// window ago. Returns how many were dropped.
    pub fn evict_finished(&self) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let now = Instant::now();
        let before = self.states.len();
        self.states.retain(|_, entry| !entry.is_stale(now, retention));
        let evicted = before.saturating_sub(self.states.len());
        if evicted > 0 {
            tracing::debug!(evicted, "evicted finished task states");
        }
        evicted
    }

    /// Stops accepting work. Tasks still waiting for a worker fail; running
    /// tasks finish.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn submit_as(&self, task_id: &str, task_name: &str, args: Value) -> Result<()> {
        if self.permits.is_closed() {
            return Err(Error::QueueUnavailable {
                operation: "submit".to_string(),
                message: "queue is shut down".to_string(),
            });
        }
        self.evict_finished();

        match self.states.entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::Internal(format!("task {task_id} is already submitted")));
            },
            Entry::Vacant(slot) => {
                slot.insert(TaskEntry::pending());
            },
        }

        let handler = Arc::clone(&self.handler);
        let states = Arc::clone(&self.states);
        let running = Arc::clone(&self.running);
        let permits = Arc::clone(&self.permits);
        let id = task_id.to_string();
        let name = task_name.to_string();
        let (start, started) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            // Nothing runs until the abort handle is registered, so the
            // removal below always finds it.
            let _ = started.await;
            let Ok(_permit) = permits.acquire_owned().await else {
                if let Some(mut entry) = states.get_mut(&id) {
                    entry.finish(TaskState::Failure {
                        message: "queue is shut down".to_string(),
                    });
                }
                running.remove(&id);
                return;
            };
            // A forgotten task must not resurrect its state.
            match states.get_mut(&id) {
                Some(mut entry) => entry.state = TaskState::Running,
                None => return,
            }
            tracing::debug!(task_id = %id, task = %name, "task started");

            let state = match handler.handle(&id, &name, args).await {
                Ok(value) => TaskState::Success { value },
                Err(e) => {
                    tracing::warn!(task_id = %id, task = %name, error = %e, "task failed");
                    TaskState::Failure {
                        message: e.to_string(),
                    }
                },
            };
            if let Some(mut entry) = states.get_mut(&id) {
                entry.finish(state);
            }
            running.remove(&id);
        });

        self.running
            .insert(task_id.to_string(), handle.abort_handle());
        let _ = start.send(());
        tracing::debug!(task_id, task = task_name, "task submitted");
        Ok(())
    }

    async fn fetch(&self, task_id: &str) -> Result<TaskState> {
        Ok(self
            .states
            .get(task_id)
            .map(|entry| entry.state.clone())
            .unwrap_or(TaskState::Pending))
    }

    async fn forget(&self, task_id: &str) -> Result<()> {
        self.states.remove(task_id);
        if let Some((_, handle)) = self.running.remove(task_id) {
            handle.abort();
            tracing::debug!(%task_id, "aborted forgotten task");
        }
        Ok(())
    }
}
