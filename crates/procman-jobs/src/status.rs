//! Job lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Lifecycle status of a job.
///
/// # State Machine
///
/// ```text
/// Accepted   -> Running, Successful, Failed, Dismissed
/// Running    -> Successful, Failed, Dismissed
/// Successful -> Dismissed
/// Failed     -> Dismissed
/// Dismissed  -> (none)
/// ```
///
/// `Successful`, `Failed` and `Dismissed` are terminal: execution is over
/// and the outcome is fixed. A finished job can still be dismissed, which
/// only discards it.
///
/// Progress reports while `Running` are updates, not transitions; they are
/// handled by [`JobStatusRecord::apply_progress`](crate::JobStatusRecord::apply_progress).
///
/// # Examples
///
/// ```
/// use procman_jobs::JobStatus;
///
/// assert!(JobStatus::Accepted.can_transition_to(&JobStatus::Successful));
/// assert!(!JobStatus::Successful.can_transition_to(&JobStatus::Running));
/// assert_eq!(serde_json::to_string(&JobStatus::Running).unwrap(), "\"running\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted to the queue, not yet picked up.
    Accepted,
    /// A worker is executing the process.
    Running,
    /// Finished with a result (terminal).
    Successful,
    /// Finished with an error (terminal).
    Failed,
    /// Deleted on request (terminal).
    Dismissed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Dismissed => "dismissed",
        };
        f.write_str(s)
    }
}

impl JobStatus {
    /// Returns `true` for `Successful`, `Failed` and `Dismissed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Dismissed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// Self-transitions are rejected.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }
        match self {
            Self::Accepted => true,
            Self::Running => !matches!(next, Self::Accepted),
            Self::Successful | Self::Failed => matches!(next, Self::Dismissed),
            Self::Dismissed => false,
        }
    }

    /// Validates a transition, returning [`JobError::InvalidTransition`] with
    /// context when it is rejected.
    pub fn validate_transition(&self, job_id: &str, next: &Self) -> Result<(), JobError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                job_id: job_id.to_string(),
                from: *self,
                to: *next,
            })
        }
    }
}
