//! The contract every process implementation fulfils.
//!
//! A process is a named, versioned computation with a declared input and
//! output contract. Implementations provide [`Process::description`] and
//! [`Process::execute`]; validation has default implementations driven by
//! the description.
//!
//! Processes are assumed to be pure functions of their declared inputs.
//! Results are memoized by input fingerprint, so a process that depends on
//! wall-clock time or external state will be served stale results.

pub mod progress;
pub mod validation;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{OutputSelection, ProcessDescriptor};

pub use progress::{ProgressSink, ProgressUpdate};

/// A process implementation.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use procman::process::{Process, ProgressSink};
/// use procman::types::{InputDescription, OutputDescription, OutputSelection, ProcessDescriptor, Schema};
/// use procman::Result;
/// use serde_json::{json, Map, Value};
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl Process for Uppercase {
///     fn description(&self) -> Option<ProcessDescriptor> {
///         Some(
///             ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
///                 .with_input("text", InputDescription::new(Schema::string()))
///                 .with_output("result", OutputDescription::new(Schema::string())),
///         )
///     }
///
///     async fn execute(
///         &self,
///         inputs: &Map<String, Value>,
///         _outputs: Option<&OutputSelection>,
///         _progress: Option<ProgressSink>,
///     ) -> Result<Value> {
///         let text = inputs.get("text").and_then(Value::as_str).unwrap_or_default();
///         Ok(json!({"result": text.to_uppercase()}))
///     }
/// }
/// ```
#[async_trait]
pub trait Process: Send + Sync {
    /// The process description. `None` makes the implementation
    /// unregistrable.
    fn description(&self) -> Option<ProcessDescriptor>;

    /// Checks `inputs` against the declared inputs.
    async fn validate_inputs(&self, inputs: &Value) -> Result<()> {
        let descriptor = self.require_description()?;
        validation::validate_inputs(&descriptor, inputs)
    }

    /// Checks an output selection against the declared outputs.
    async fn validate_outputs(&self, selection: Option<&OutputSelection>) -> Result<()> {
        let descriptor = self.require_description()?;
        validation::validate_outputs(&descriptor, selection)
    }

    /// Runs the process and returns its outputs as a JSON object keyed by
    /// output name.
    ///
    /// `progress` may be used zero or more times before returning.
    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        outputs: Option<&OutputSelection>,
        progress: Option<ProgressSink>,
    ) -> Result<Value>;

    #[doc(hidden)]
    fn require_description(&self) -> Result<ProcessDescriptor> {
        self.description()
            .ok_or_else(|| Error::Internal("process has no description".to_string()))
    }
}

/// A process built from a descriptor and a synchronous function.
///
/// Useful for small, CPU-bound processes that need no progress reporting.
///
/// # Examples
///
/// ```
/// use procman::process::SyncProcess;
/// use procman::types::{InputDescription, OutputDescription, ProcessDescriptor, Schema};
/// use serde_json::{json, Value};
///
/// let uppercase = SyncProcess::new(
///     ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
///         .with_input("text", InputDescription::new(Schema::string()))
///         .with_output("result", OutputDescription::new(Schema::string())),
///     |inputs| {
///         let text = inputs.get("text").and_then(Value::as_str).unwrap_or_default();
///         Ok(json!({"result": text.to_uppercase()}))
///     },
/// );
/// # let _ = uppercase;
/// ```
pub struct SyncProcess<F> {
    descriptor: ProcessDescriptor,
    handler: F,
}

impl<F> std::fmt::Debug for SyncProcess<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProcess")
            .field("id", &self.descriptor.id)
            .field("version", &self.descriptor.version)
            .finish()
    }
}

impl<F> SyncProcess<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync,
{
    /// Wraps `handler` under `descriptor`.
    pub fn new(descriptor: ProcessDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

#[async_trait]
impl<F> Process for SyncProcess<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync,
{
    fn description(&self) -> Option<ProcessDescriptor> {
        Some(self.descriptor.clone())
    }

    async fn execute(
        &self,
        inputs: &Map<String, Value>,
        _outputs: Option<&OutputSelection>,
        _progress: Option<ProgressSink>,
    ) -> Result<Value> {
        (self.handler)(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputDescription, OutputDescription, Schema};
    use serde_json::json;

    fn echo() -> SyncProcess<impl Fn(&Map<String, Value>) -> Result<Value> + Send + Sync> {
        SyncProcess::new(
            ProcessDescriptor::new("echo", "1.0.0", "Echo")
                .with_input("value", InputDescription::new(Schema::string()))
                .with_output("value", OutputDescription::new(Schema::string())),
            |inputs| Ok(Value::Object(inputs.clone())),
        )
    }

    #[tokio::test]
    async fn default_validation_uses_the_description() {
        let process = echo();
        assert!(process.validate_inputs(&json!({"value": "x"})).await.is_ok());
        assert!(process.validate_inputs(&json!({})).await.is_err());
        assert!(process
            .validate_outputs(Some(&OutputSelection::from_names(["nope"])))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn sync_process_runs_its_handler() {
        let inputs = json!({"value": "x"});
        let out = echo()
            .execute(inputs.as_object().unwrap(), None, None)
            .await
            .unwrap();
        assert_eq!(out, inputs);
    }

    struct Undescribed;

    #[async_trait]
    impl Process for Undescribed {
        fn description(&self) -> Option<ProcessDescriptor> {
            None
        }

        async fn execute(
            &self,
            _inputs: &Map<String, Value>,
            _outputs: Option<&OutputSelection>,
            _progress: Option<ProgressSink>,
        ) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn validation_without_description_is_internal() {
        let err = Undescribed.validate_inputs(&json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
