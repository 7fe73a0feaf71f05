//! Integration tests for JobStore and ResultCache over the in-memory backend.
//!
//! Organized into module blocks per concern.

use std::sync::Arc;
use std::time::Duration;

use procman_jobs::store::ListJobsOptions;
use procman_jobs::{
    CacheBackend, InMemoryBackend, JobError, JobResult, JobStatus, JobStatusRecord, JobStore,
    ResultCache, StoreConfig,
};
use serde_json::json;

fn stores() -> (Arc<InMemoryBackend>, JobStore, ResultCache) {
    let backend = Arc::new(InMemoryBackend::new());
    let jobs = JobStore::new(backend.clone());
    let results = ResultCache::new(backend.clone());
    (backend, jobs, results)
}

// ─── Lifecycle Tests ────────────────────────────────────────────────────────

mod lifecycle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_accepted_running_successful() {
        let (_, jobs, _) = stores();
        jobs.put(JobStatusRecord::new("j-1", "uppercase")).await.unwrap();

        let running = jobs
            .update_progress("j-1", 30, Some("working".to_string()))
            .await
            .unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert_eq!(running.progress, 30);

        let done = jobs
            .complete(
                "j-1",
                "uppercase",
                JobResult::Value {
                    value: json!({"result": "ABC"}),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Successful);
        assert_eq!(done.progress, 100);
        assert_eq!(done.message.as_deref(), Some("working"));
        assert!(done.updated >= running.updated);
        assert!(done.finished.is_some());
    }

    #[tokio::test]
    async fn test_failure_keeps_progress() {
        let (_, jobs, _) = stores();
        jobs.put(JobStatusRecord::new("j-1", "uppercase")).await.unwrap();
        jobs.update_progress("j-1", 60, None).await.unwrap();

        let failed = jobs.fail("j-1", "uppercase", "division by zero").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 60);
        assert_eq!(failed.message.as_deref(), Some("division by zero"));
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_second_completion() {
        let (_, jobs, _) = stores();
        jobs.fail("j-1", "uppercase", "boom").await.unwrap();

        let err = jobs
            .complete(
                "j-1",
                "uppercase",
                JobResult::Value { value: json!(1) },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Successful,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (_, jobs, _) = stores();
        jobs.put(JobStatusRecord::new("j-1", "uppercase")).await.unwrap();
        assert!(jobs.delete("j-1").await.unwrap());
        assert!(matches!(
            jobs.get("j-1").await,
            Err(JobError::NotFound { .. })
        ));
        assert!(!jobs.delete("j-1").await.unwrap());
    }
}

// ─── Listing Tests ──────────────────────────────────────────────────────────

mod listing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed(jobs: &JobStore, count: usize) {
        for i in 0..count {
            jobs.put(JobStatusRecord::new(format!("job-{i:02}"), "uppercase"))
                .await
                .unwrap();
            // Distinct creation timestamps.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_, jobs, _) = stores();
        seed(&jobs, 3).await;

        let page = jobs.list(ListJobsOptions::default()).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-02", "job-01", "job-00"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn test_list_pages_through_everything() {
        let (_, jobs, _) = stores();
        seed(&jobs, 5).await;

        let mut seen = Vec::new();
        let mut offset = Some(0);
        while let Some(current) = offset {
            let page = jobs
                .list(ListJobsOptions {
                    offset: current,
                    limit: 2,
                })
                .await
                .unwrap();
            assert!(page.items.len() <= 2);
            seen.extend(page.items.into_iter().map(|r| r.job_id));
            offset = page.next;
        }
        assert_eq!(seen.len(), 5);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_job_ids_never_carry_namespace() {
        let (_, jobs, results) = stores();
        seed(&jobs, 2).await;
        results.put("fingerprint", &json!(1)).await.unwrap();

        let mut ids = jobs.job_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["job-00".to_string(), "job-01".to_string()]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_ties_by_id() {
        let (_, jobs, _) = stores();
        let first = JobStatusRecord::new("b", "uppercase");
        let mut second = JobStatusRecord::new("a", "uppercase");
        second.created = first.created;
        jobs.put(first).await.unwrap();
        jobs.put(second).await.unwrap();

        let page = jobs.list(ListJobsOptions::default()).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

// ─── Retention Tests ────────────────────────────────────────────────────────

mod retention_tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_and_results_share_retention() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = StoreConfig {
            retention: Some(Duration::from_millis(30)),
            ..StoreConfig::default()
        };
        let jobs = JobStore::new(backend.clone()).with_config(config.clone());
        let results = ResultCache::new(backend.clone()).with_config(config);

        jobs.put(JobStatusRecord::new("j-1", "uppercase")).await.unwrap();
        results.put("f", &json!("v")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(jobs.find("j-1").await.unwrap().is_none());
        assert!(!results.contains("f").await.unwrap());
        assert_eq!(backend.cleanup_expired().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_no_retention_keeps_entries() {
        let backend = Arc::new(InMemoryBackend::new());
        let results = ResultCache::new(backend).with_config(StoreConfig {
            retention: None,
            ..StoreConfig::default()
        });
        results.put("f", &json!("v")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(results.contains("f").await.unwrap());
    }
}

// ─── Concurrency Tests ──────────────────────────────────────────────────────

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_writers_to_distinct_jobs() {
        let (_, jobs, _) = stores();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let jobs = jobs.clone();
                tokio::spawn(async move {
                    jobs.complete(
                        &format!("j-{i}"),
                        "uppercase",
                        JobResult::Value { value: json!(i) },
                        None,
                    )
                    .await
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }
        assert_eq!(jobs.job_ids().await.unwrap().len(), 32);
    }
}
