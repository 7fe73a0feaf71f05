//! Responses returned by the orchestrator.

use procman_jobs::{JobStatus, JobStatusRecord, Link, MEDIA_TYPE_JSON};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::description::{JobControlOption, ProcessDescriptor, TransmissionMode};

/// Outcome of an `execute` call.
///
/// Sync executions and cache hits carry the shaped result in `value`; async
/// submissions carry only the job id and `accepted` status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Job id tracking this execution.
    #[serde(rename = "jobID")]
    pub job_id: String,

    /// Job status at the time of the response.
    pub status: JobStatus,

    /// Always `"process"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Status message, e.g. `"Result retrieved from cache"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The shaped result, when available inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Links to the job and its results.
    #[serde(default)]
    pub links: Vec<Link>,
}

impl ExecuteResponse {
    /// Builds a response from the job record and an optional inline value.
    pub fn from_record(record: &JobStatusRecord, value: Option<Value>) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            kind: record.kind.clone(),
            message: record.message.clone(),
            value,
            links: record.links.clone(),
        }
    }

    /// Returns `true` if the result is included.
    pub fn is_complete(&self) -> bool {
        self.value.is_some()
    }
}

/// Listing entry for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    /// Process id.
    pub id: String,
    /// Latest registered version.
    pub version: String,
    /// Display title.
    pub title: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Supported execution and control modes.
    pub job_control_options: Vec<JobControlOption>,
    /// Supported output transmission modes.
    pub output_transmission: Vec<TransmissionMode>,
    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Link to the full description.
    pub links: Vec<Link>,
}

impl ProcessSummary {
    /// Summarizes a descriptor, linking to `{base_path}/processes/{id}`.
    pub fn from_descriptor(descriptor: &ProcessDescriptor, base_path: &str) -> Self {
        let href = format!(
            "{}/processes/{}",
            base_path.trim_end_matches('/'),
            descriptor.id
        );
        Self {
            id: descriptor.id.clone(),
            version: descriptor.version.clone(),
            title: descriptor.title.clone(),
            description: descriptor.description.clone(),
            job_control_options: descriptor.job_control_options.clone(),
            output_transmission: descriptor.output_transmission.clone(),
            keywords: descriptor.keywords.clone(),
            links: vec![Link::new(href, "self").with_media_type(MEDIA_TYPE_JSON)],
        }
    }
}
