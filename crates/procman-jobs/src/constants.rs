//! Key namespaces and link vocabulary shared by the stores.

/// Namespace for memoized results, keyed by input fingerprint.
pub const RESULTS_NAMESPACE: &str = "process_results";

/// Namespace for job status records, keyed by job id.
pub const JOBS_NAMESPACE: &str = "job";

/// Namespace for process registrations, keyed by `{process_id}:{version}`.
pub const REGISTRY_NAMESPACE: &str = "process_registry";

/// Default retention for results and job records: 7 days.
pub const DEFAULT_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// Record `type` written on every job.
pub const JOB_TYPE_PROCESS: &str = "process";

/// Link relation pointing at the job status document.
pub const REL_SELF: &str = "self";

/// Link relation pointing at the job results document.
pub const REL_RESULTS: &str = "results";

/// Media type advertised on job links.
pub const MEDIA_TYPE_JSON: &str = "application/json";
