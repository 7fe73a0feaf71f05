//! Property-based tests using proptest.
//!
//! Verifies job status state machine invariants, record monotonicity under
//! arbitrary operation sequences, pagination bounds, and that arbitrary JSON
//! never panics the record decoder.

use proptest::prelude::*;
use serde_json::{json, Value};

use procman_jobs::{JobResult, JobStatus, JobStatusRecord, Page};

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

fn arb_status() -> impl Strategy<Value = JobStatus> {
    prop::sample::select(vec![
        JobStatus::Accepted,
        JobStatus::Running,
        JobStatus::Successful,
        JobStatus::Failed,
        JobStatus::Dismissed,
    ])
}

#[derive(Debug, Clone)]
enum Op {
    Progress(u8),
    Complete,
    Fail,
    Dismiss,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::Progress),
        1 => Just(Op::Complete),
        1 => Just(Op::Fail),
        1 => Just(Op::Dismiss),
    ]
}

// ─── State Machine Properties ───────────────────────────────────────────────

proptest! {
    #[test]
    fn terminal_states_only_move_to_dismissed(from in arb_status(), to in arb_status()) {
        if from.is_terminal() && from.can_transition_to(&to) {
            prop_assert_eq!(to, JobStatus::Dismissed);
        }
    }

    #[test]
    fn dismissed_is_absorbing(to in arb_status()) {
        prop_assert!(!JobStatus::Dismissed.can_transition_to(&to));
    }

    #[test]
    fn nothing_returns_to_accepted(from in arb_status()) {
        prop_assert!(!from.can_transition_to(&JobStatus::Accepted));
    }

    #[test]
    fn validate_agrees_with_can_transition(from in arb_status(), to in arb_status()) {
        prop_assert_eq!(
            from.validate_transition("job", &to).is_ok(),
            from.can_transition_to(&to)
        );
    }
}

// ─── Record Properties ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn record_invariants_hold_under_any_op_sequence(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut record = JobStatusRecord::new("job", "uppercase");
        let mut previous_updated = record.updated;
        let mut terminal_snapshot: Option<JobStatusRecord> = None;

        for op in ops {
            let op_kind = op.clone();
            let outcome = match op {
                Op::Progress(p) => record.apply_progress(p, None),
                Op::Complete => record.complete(JobResult::Value { value: json!(1) }, None),
                Op::Fail => record.fail("failed"),
                Op::Dismiss => record.dismiss(),
            };

            prop_assert!(record.progress <= 100);
            prop_assert!(record.updated >= previous_updated);
            prop_assert!(record.updated >= record.created);
            previous_updated = record.updated;

            if let Some(snapshot) = &terminal_snapshot {
                // Once terminal, only dismissal of a finished job may succeed.
                if outcome.is_ok() {
                    prop_assert!(matches!(op_kind, Op::Dismiss));
                    prop_assert_eq!(record.status, JobStatus::Dismissed);
                    prop_assert_eq!(&record.result, &snapshot.result);
                    terminal_snapshot = Some(record.clone());
                } else {
                    prop_assert_eq!(snapshot, &record);
                }
            } else if record.is_terminal() {
                prop_assert!(record.finished.is_some());
                terminal_snapshot = Some(record.clone());
            }
        }
    }

    #[test]
    fn successful_records_are_at_100(progress in prop::collection::vec(any::<u8>(), 0..5)) {
        let mut record = JobStatusRecord::new("job", "uppercase");
        for p in progress {
            record.apply_progress(p, None).unwrap();
        }
        record.complete(JobResult::Value { value: Value::Null }, None).unwrap();
        prop_assert_eq!(record.progress, 100);
    }
}

// ─── Pagination Properties ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn page_never_exceeds_limit(total in 0usize..200, offset in 0usize..250, limit in 1usize..50) {
        let page = Page::from_vec((0..total).collect::<Vec<_>>(), offset, limit);
        prop_assert!(page.items.len() <= limit);
        prop_assert_eq!(page.total, total);
        prop_assert_eq!(page.next.is_some(), offset + limit < total);
        if let Some(next) = page.next {
            prop_assert_eq!(next, offset + limit);
        }
    }

    #[test]
    fn walking_pages_visits_every_item_once(total in 0usize..100, limit in 1usize..20) {
        let items: Vec<usize> = (0..total).collect();
        let mut seen = Vec::new();
        let mut offset = Some(0);
        while let Some(current) = offset {
            let page = Page::from_vec(items.clone(), current, limit);
            seen.extend(page.items);
            offset = page.next;
        }
        prop_assert_eq!(seen, items);
    }
}

// ─── Fuzz Deserialization ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn arbitrary_json_never_panics_the_decoder(s in "\\PC{0,200}") {
        let _ = serde_json::from_str::<JobStatusRecord>(&s);
        let _ = serde_json::from_str::<JobStatus>(&s);
    }

    #[test]
    fn record_survives_storage_encoding(job_id in "[a-z0-9-]{1,36}", process_id in "[a-z_]{1,20}") {
        let record = JobStatusRecord::new(job_id, process_id).with_links("/api");
        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: JobStatusRecord = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(decoded, record);
    }
}
