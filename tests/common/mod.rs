//! Processes and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procman::process::{Process, ProgressSink};
use procman::types::{
    InputDescription, OutputDescription, OutputSelection, ProcessDescriptor, Schema, SchemaType,
};
use procman::{Error, JobStatusRecord, ProcessManager, Result};
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

/// Uppercases `text`. Counts its executions.
#[derive(Default)]
pub struct Uppercase {
    pub calls: Arc<AtomicUsize>,
}

impl Uppercase {
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Process for Uppercase {
    fn description(&self) -> Option<ProcessDescriptor> {
        Some(
            ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
                .with_description("Converts text to upper case")
                .with_input(
                    "text",
                    InputDescription::new(Schema::string().with_length(Some(1), Some(1000)))
                        .with_title("Text"),
                )
                .with_output("result", OutputDescription::new(Schema::string()))
                .with_output(
                    "length",
                    OutputDescription::new(Schema::of(SchemaType::Integer)),
                ),
        )
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        _outputs: Option<&OutputSelection>,
        progress: Option<ProgressSink>,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = inputs
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::execution("text is not a string"))?;
        if let Some(progress) = progress {
            progress.report(50, "uppercasing")?;
        }
        Ok(json!({
            "result": text.to_uppercase(),
            "length": text.chars().count(),
        }))
    }
}

/// Doubles `n` once the gate opens. Fails for negative `n`.
pub struct Gated {
    pub gate: Arc<Notify>,
    pub calls: Arc<AtomicUsize>,
}

impl Gated {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Process for Gated {
    fn description(&self) -> Option<ProcessDescriptor> {
        Some(
            ProcessDescriptor::new("double", "1.0.0", "Double")
                .with_input("n", InputDescription::new(Schema::of(SchemaType::Integer)))
                .with_output("value", OutputDescription::new(Schema::of(SchemaType::Integer))),
        )
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        _outputs: Option<&OutputSelection>,
        progress: Option<ProgressSink>,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(progress) = &progress {
            progress.report(10, "waiting for the gate")?;
        }
        self.gate.notified().await;
        let n = inputs.get("n").and_then(Value::as_i64).unwrap_or_default();
        if n < 0 {
            return Err(Error::execution(format!("cannot double {n}")));
        }
        Ok(json!({ "value": n * 2 }))
    }
}

/// A manager with `uppercase` registered.
pub async fn uppercase_manager() -> (ProcessManager, Arc<AtomicUsize>) {
    let process = Uppercase::default();
    let calls = process.calls();
    let manager = ProcessManager::builder()
        .process("uppercase", process)
        .build()
        .await
        .expect("manager builds");
    (manager, calls)
}

/// Polls a job until `done` holds for its status record.
pub async fn wait_for(
    manager: &ProcessManager,
    job_id: &str,
    done: impl Fn(&JobStatusRecord) -> bool,
) -> JobStatusRecord {
    for _ in 0..400 {
        let record = manager.get_job_status(job_id).await.expect("job exists");
        if done(&record) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} did not reach the expected state");
}
