//! Error types for procman.
//!
//! [`Error`] is the single error type surfaced by the registry, the
//! orchestrator and the worker. Every variant carries the identifiers needed
//! to render a useful diagnostic; [`Error::kind`] classifies it for callers
//! that map errors onto a transport (HTTP status codes, exit codes).

use procman_jobs::{JobError, StorageError};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is invalid. Never retried.
    Client,
    /// The process or job does not exist.
    NotFound,
    /// The job exists but has no result yet.
    NotReady,
    /// The job ran and failed.
    Failed,
    /// A collaborator (cache, queue) did not answer in time or at all.
    Unavailable,
    /// A bug or corrupted state.
    Internal,
}

/// Errors raised by procman operations.
///
/// # Examples
///
/// ```
/// use procman::{Error, ErrorKind};
///
/// let err = Error::input_validation("text", "string", "number");
/// assert_eq!(err.kind(), ErrorKind::Client);
/// assert!(err.to_string().contains("text"));
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// No registration exists for the process id.
    #[error("process not found: {process_id}")]
    ProcessNotFound {
        /// The requested process id.
        process_id: String,
    },

    /// A registration exists but its implementation is not available here.
    #[error("failed to load process {process_id} from {locator}: {reason}")]
    ProcessLoad {
        /// The process id.
        process_id: String,
        /// The stored locator.
        locator: String,
        /// Why loading failed.
        reason: String,
    },

    /// The implementation cannot be registered.
    #[error("cannot register process {process_id}: {reason}")]
    Registration {
        /// The process id passed to `register`.
        process_id: String,
        /// What is wrong with the implementation.
        reason: String,
    },

    /// An input is missing or has the wrong shape.
    #[error("invalid input '{field}': {message}")]
    InputValidation {
        /// The offending input name.
        field: String,
        /// Expected type or constraint.
        expected: String,
        /// What was received.
        actual: String,
        /// Human-readable description.
        message: String,
    },

    /// The output selection names outputs the process does not declare.
    #[error("{message}")]
    OutputValidation {
        /// Requested outputs that do not exist.
        invalid: Vec<String>,
        /// Outputs the process declares.
        available: Vec<String>,
        /// Human-readable description.
        message: String,
    },

    /// No job exists for the id.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The requested job id.
        job_id: String,
    },

    /// The job has not produced a result yet.
    #[error("result not ready for job {job_id} (status: {status})")]
    JobNotReady {
        /// The job id.
        job_id: String,
        /// Its current status.
        status: String,
    },

    /// The job ran and failed.
    #[error("job {job_id} failed: {message}")]
    JobFailed {
        /// The job id.
        job_id: String,
        /// Failure message recorded for the job.
        message: String,
    },

    /// The key-value store failed or timed out.
    #[error("cache unavailable during {operation}: {message}")]
    CacheUnavailable {
        /// Operation that was attempted.
        operation: String,
        /// Underlying failure.
        message: String,
    },

    /// The task queue failed or timed out.
    #[error("queue unavailable during {operation}: {message}")]
    QueueUnavailable {
        /// Operation that was attempted.
        operation: String,
        /// Underlying failure.
        message: String,
    },

    /// A process implementation reported a failure.
    #[error("execution failed: {message}")]
    Execution {
        /// Failure message from the process.
        message: String,
    },

    /// Configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Stored state could not be decoded, or another invariant broke.
    #[error("internal error: {0}")]
    Internal(String),

    /// Any other error raised by a process implementation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Builds an [`Error::InputValidation`] for a type mismatch.
    pub fn input_validation(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let (field, expected, actual) = (field.into(), expected.into(), actual.into());
        let message = format!("expected {expected}, got {actual}");
        Self::InputValidation {
            field,
            expected,
            actual,
            message,
        }
    }

    /// Builds an [`Error::InputValidation`] for a required input that is
    /// absent.
    pub fn missing_input(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::InputValidation {
            message: format!("Missing required input '{field}'"),
            expected: "a value".to_string(),
            actual: "nothing".to_string(),
            field,
        }
    }

    /// Builds an [`Error::OutputValidation`] for unknown output names.
    pub fn unknown_outputs(invalid: Vec<String>, available: Vec<String>) -> Self {
        let message = format!(
            "Invalid output(s) requested: {}. Available outputs: {}",
            invalid.join(", "),
            available.join(", ")
        );
        Self::OutputValidation {
            invalid,
            available,
            message,
        }
    }

    /// Builds an [`Error::Execution`].
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation { .. }
            | Self::OutputValidation { .. }
            | Self::Registration { .. } => ErrorKind::Client,
            Self::ProcessNotFound { .. } | Self::JobNotFound { .. } => ErrorKind::NotFound,
            Self::JobNotReady { .. } => ErrorKind::NotReady,
            Self::JobFailed { .. } | Self::Execution { .. } | Self::Other(_) => ErrorKind::Failed,
            Self::CacheUnavailable { .. } | Self::QueueUnavailable { .. } => {
                ErrorKind::Unavailable
            },
            Self::ProcessLoad { .. } | Self::Config(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` for errors worth retrying later.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Maps a store error raised during `operation`.
    ///
    /// Missing jobs become [`Error::JobNotFound`]; backend failures become
    /// [`Error::CacheUnavailable`].
    pub(crate) fn from_store(err: JobError, operation: &str) -> Self {
        match err {
            JobError::NotFound { job_id } => Self::JobNotFound { job_id },
            JobError::InvalidTransition { job_id, from, to } => {
                Self::Internal(format!("job {job_id} cannot move from {from} to {to}"))
            },
            JobError::Serialization { key, message } => {
                Self::Internal(format!("corrupted entry {key}: {message}"))
            },
            JobError::Storage(e) => Self::CacheUnavailable {
                operation: operation.to_string(),
                message: e.to_string(),
            },
        }
    }

    pub(crate) fn from_storage(err: StorageError, operation: &str) -> Self {
        Self::CacheUnavailable {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn cache_timeout(operation: &str) -> Self {
        Self::CacheUnavailable {
            operation: operation.to_string(),
            message: "timed out".to_string(),
        }
    }

    pub(crate) fn queue_timeout(operation: &str) -> Self {
        Self::QueueUnavailable {
            operation: operation.to_string(),
            message: "timed out".to_string(),
        }
    }
}

impl From<JobError> for Error {
    fn from(err: JobError) -> Self {
        Self::from_store(err, "job store access")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}
