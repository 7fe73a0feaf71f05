//! Job status record: the persisted view of one unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{JOB_TYPE_PROCESS, MEDIA_TYPE_JSON, REL_RESULTS, REL_SELF};
use crate::error::JobError;
use crate::status::JobStatus;

/// A hyperlink attached to a job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL or path.
    pub href: String,
    /// Link relation (`self`, `results`, ...).
    pub rel: String,
    /// Media type of the target.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    /// Creates a link with no media type or title.
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            media_type: None,
            title: None,
        }
    }

    /// Sets the media type (builder pattern).
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Builds the `self` and `results` links for a job.
    ///
    /// # Examples
    ///
    /// ```
    /// use procman_jobs::Link;
    ///
    /// let links = Link::job_links("/api", "j-1");
    /// assert_eq!(links[0].href, "/api/jobs/j-1");
    /// assert_eq!(links[1].href, "/api/jobs/j-1/results");
    /// ```
    pub fn job_links(base_path: &str, job_id: &str) -> Vec<Link> {
        let base = base_path.trim_end_matches('/');
        vec![
            Link::new(format!("{base}/jobs/{job_id}"), REL_SELF).with_media_type(MEDIA_TYPE_JSON),
            Link::new(format!("{base}/jobs/{job_id}/results"), REL_RESULTS)
                .with_media_type(MEDIA_TYPE_JSON),
        ]
    }
}

/// Where the result of a successful job lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    /// The result value is stored inline in the record.
    Value {
        /// The process output.
        value: Value,
    },
    /// The result lives in the result cache under this fingerprint.
    Cached {
        /// Input fingerprint the result was memoized under.
        fingerprint: String,
    },
}

/// Lifecycle state for one unit of work, keyed by job id.
///
/// Timestamps are UTC. `updated` never moves backwards, even if the wall
/// clock does.
///
/// # Examples
///
/// ```
/// use procman_jobs::{JobResult, JobStatus, JobStatusRecord};
/// use serde_json::json;
///
/// let mut record = JobStatusRecord::new("j-1", "uppercase");
/// assert_eq!(record.status, JobStatus::Accepted);
///
/// record.apply_progress(40, Some("halfway".to_string())).unwrap();
/// assert_eq!(record.status, JobStatus::Running);
///
/// record
///     .complete(JobResult::Value { value: json!({"result": "ABC"}) }, None)
///     .unwrap();
/// assert_eq!(record.progress, 100);
/// assert!(record.finished.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    /// Opaque job identifier, never namespaced.
    #[serde(rename = "jobID")]
    pub job_id: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Always `"process"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The process this job runs.
    #[serde(rename = "processID")]
    pub process_id: String,

    /// When the job was submitted.
    pub created: DateTime<Utc>,

    /// When a worker first reported progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,

    /// When the job reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,

    /// Last modification time.
    pub updated: DateTime<Utc>,

    /// Completion percentage, 0 to 100.
    pub progress: u8,

    /// Latest human-readable status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result location once successful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,

    /// `self` and `results` links.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Fingerprint of the inputs, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Output selection and response mode from the submitting request,
    /// replayed when the result is fetched.
    #[serde(rename = "requestOptions", default, skip_serializing_if = "Option::is_none")]
    pub request_options: Option<Value>,
}

impl JobStatusRecord {
    /// Creates an `accepted` record with 0% progress.
    pub fn new(job_id: impl Into<String>, process_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Accepted,
            kind: JOB_TYPE_PROCESS.to_string(),
            process_id: process_id.into(),
            created: now,
            started: None,
            finished: None,
            updated: now,
            progress: 0,
            message: None,
            result: None,
            links: Vec::new(),
            fingerprint: None,
            request_options: None,
        }
    }

    /// Attaches the `self`/`results` links under `base_path`.
    pub fn with_links(mut self, base_path: &str) -> Self {
        self.links = Link::job_links(base_path, &self.job_id);
        self
    }

    /// Records the input fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Stores the request's output shaping options.
    pub fn with_request_options(mut self, options: Option<Value>) -> Self {
        self.request_options = options;
        self
    }

    /// Sets the status message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns `true` once the job can no longer change.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advances `updated` to now without letting it move backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated {
            self.updated = now;
        }
    }

    /// Records a progress report, moving the job to `running`.
    ///
    /// Percentages above 100 are clamped. A `None` message keeps the
    /// previous one.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub fn apply_progress(&mut self, percent: u8, message: Option<String>) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            self.status
                .validate_transition(&self.job_id, &JobStatus::Running)?;
            self.status = JobStatus::Running;
        }
        self.started.get_or_insert_with(Utc::now);
        self.progress = percent.min(100);
        if message.is_some() {
            self.message = message;
        }
        self.touch();
        Ok(())
    }

    /// Marks the job `successful` with 100% progress.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub fn complete(&mut self, result: JobResult, message: Option<String>) -> Result<(), JobError> {
        self.finish(JobStatus::Successful)?;
        self.progress = 100;
        self.result = Some(result);
        if message.is_some() {
            self.message = message;
        }
        Ok(())
    }

    /// Marks the job `failed`, keeping the progress reached so far.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.finish(JobStatus::Failed)?;
        self.message = Some(message.into());
        Ok(())
    }

    /// Marks the job `dismissed`. A finished job keeps its result and
    /// finish time.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already dismissed.
    pub fn dismiss(&mut self) -> Result<(), JobError> {
        self.finish(JobStatus::Dismissed)?;
        self.message = Some("Job dismissed".to_string());
        Ok(())
    }

    fn finish(&mut self, status: JobStatus) -> Result<(), JobError> {
        self.status.validate_transition(&self.job_id, &status)?;
        let now = Utc::now();
        self.status = status;
        self.started.get_or_insert(now);
        self.finished.get_or_insert(now);
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_record_is_accepted() {
        let record = JobStatusRecord::new("j-1", "echo");
        assert_eq!(record.status, JobStatus::Accepted);
        assert_eq!(record.progress, 0);
        assert_eq!(record.kind, "process");
        assert_eq!(record.created, record.updated);
        assert!(record.started.is_none());
        assert!(record.links.is_empty());
    }

    #[test]
    fn progress_is_clamped() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        record.apply_progress(250, None).unwrap();
        assert_eq!(record.progress, 100);
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.started.is_some());
    }

    #[test]
    fn progress_keeps_previous_message_when_none() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        record
            .apply_progress(10, Some("loading".to_string()))
            .unwrap();
        record.apply_progress(20, None).unwrap();
        assert_eq!(record.message.as_deref(), Some("loading"));
        assert_eq!(record.progress, 20);
    }

    #[test]
    fn terminal_record_rejects_progress() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        record.fail("boom").unwrap();
        let err = record.apply_progress(50, None).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(record.message.as_deref(), Some("boom"));
    }

    #[test]
    fn dismissing_a_finished_job_keeps_its_outcome() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        record
            .complete(JobResult::Value { value: json!(1) }, None)
            .unwrap();
        let finished = record.finished;
        record.dismiss().unwrap();
        assert_eq!(record.status, JobStatus::Dismissed);
        assert_eq!(record.finished, finished);
        assert!(record.result.is_some());
        assert!(record.dismiss().is_err());
    }

    #[test]
    fn complete_from_accepted_sets_all_timestamps() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        record
            .complete(JobResult::Value { value: json!(1) }, None)
            .unwrap();
        assert_eq!(record.status, JobStatus::Successful);
        assert!(record.started.is_some());
        assert!(record.finished.is_some());
        assert!(record.updated >= record.created);
    }

    #[test]
    fn updated_never_moves_backwards() {
        let mut record = JobStatusRecord::new("j-1", "echo");
        let future = Utc::now() + chrono::Duration::hours(1);
        record.updated = future;
        record.touch();
        assert_eq!(record.updated, future);
    }

    #[test]
    fn wire_format_field_names() {
        let record = JobStatusRecord::new("j-1", "echo").with_links("");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["jobID"], "j-1");
        assert_eq!(value["processID"], "echo");
        assert_eq!(value["type"], "process");
        assert_eq!(value["status"], "accepted");
        assert_eq!(value["links"][0]["href"], "/jobs/j-1");
        assert_eq!(value["links"][0]["type"], "application/json");
        assert!(value.get("finished").is_none());
    }

    #[test]
    fn cached_result_serializes_with_kind_tag() {
        let result = JobResult::Cached {
            fingerprint: "ab12".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"kind": "cached", "fingerprint": "ab12"})
        );
    }
}
