//! Registry, execution orchestrator and result cache for named, versioned
//! processes.
//!
//! A process is a computation with a declared input and output contract.
//! `procman` registers processes, runs them synchronously or through a task
//! queue, memoizes results by a fingerprint of the inputs so identical
//! requests are never recomputed, and tracks every invocation as a job.
//!
//! # Overview
//!
//! ```text
//! caller -> ProcessManager -> ProcessRegistry (resolve, validate)
//!                          -> ResultCache     (fingerprint lookup)
//!                          -> TaskQueue       (dispatch) -> Worker
//!                          -> JobStore        (lifecycle bookkeeping)
//! ```
//!
//! # Module Organization
//!
//! - [`orchestrator`] - [`ProcessManager`], the single entry point
//! - [`registry`] - [`ProcessRegistry`] and its capability catalog
//! - [`process`] - The [`Process`] contract, validation and progress sink
//! - [`fingerprint`] - Canonical input hashing and [`CalculationTask`]
//! - [`queue`] - [`TaskQueue`] contract and the in-process [`LocalTaskQueue`]
//! - [`worker`] - Queue-side execution of process tasks
//! - [`types`] - Descriptions, requests and responses
//! - [`config`] - [`ServiceConfig`], loaded from TOML and the environment
//! - [`error`] - The crate-wide [`Error`]
//!
//! Job records, the result cache and the cache backends live in the
//! `procman-jobs` crate and are re-exported here.
//!
//! # Feature flags
//!
//! - `logging` (default) - [`logging::init_logging`] with `tracing-subscriber`
//! - `redis` - Redis cache backend, selected when `redis_url` is configured

pub mod config;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "logging")]
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod queue;
pub mod registry;
pub mod types;
pub mod worker;

// Re-exports for ergonomic access
pub use config::ServiceConfig;
pub use error::{Error, ErrorKind, Result};
pub use fingerprint::{fingerprint, CalculationTask};
pub use orchestrator::{ExecutionStrategy, ProcessManager, ProcessManagerBuilder};
pub use process::{Process, ProgressSink, ProgressUpdate, SyncProcess};
pub use queue::{LocalTaskQueue, TaskHandler, TaskQueue, TaskState};
pub use registry::{ProcessRegistration, ProcessRegistry, Registered};
pub use worker::Worker;

pub use procman_jobs::{
    CacheBackend, InMemoryBackend, JobResult, JobStatus, JobStatusRecord, JobStore, Link, Page,
    ResultCache, StorageError,
};
