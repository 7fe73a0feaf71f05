//! Error types for job and result store operations.

use thiserror::Error;

use crate::status::JobStatus;
use crate::store::StorageError;

/// Errors raised by [`JobStore`](crate::JobStore) and
/// [`ResultCache`](crate::ResultCache).
///
/// Backend failures are wrapped unchanged in [`JobError::Storage`] so callers
/// can distinguish an unreachable store from a missing job.
///
/// # Examples
///
/// ```
/// use procman_jobs::{JobError, JobStatus};
///
/// let err = JobError::NotFound { job_id: "j-1".to_string() };
/// assert_eq!(err.to_string(), "job not found: j-1");
///
/// let err = JobError::InvalidTransition {
///     job_id: "j-2".to_string(),
///     from: JobStatus::Successful,
///     to: JobStatus::Running,
/// };
/// assert!(err.to_string().contains("successful"));
/// ```
#[derive(Debug, Error)]
pub enum JobError {
    /// No record exists for the job id.
    #[error("job not found: {job_id}")]
    NotFound {
        /// The job id that was looked up.
        job_id: String,
    },

    /// The requested status change is not allowed from the current status.
    #[error("invalid transition from {from} to {to} for job {job_id}")]
    InvalidTransition {
        /// The job being transitioned.
        job_id: String,
        /// Current status.
        from: JobStatus,
        /// Rejected target status.
        to: JobStatus,
    },

    /// A stored document could not be encoded or decoded.
    #[error("serialization failed for key {key}: {message}")]
    Serialization {
        /// Storage key of the document.
        key: String,
        /// Encoder/decoder diagnostic.
        message: String,
    },

    /// The underlying backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JobError {
    /// Returns `true` when the failure came from the backend rather than
    /// from the state of the job itself.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Serialization { .. })
    }
}
