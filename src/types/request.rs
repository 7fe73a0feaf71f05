//! Execution requests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::description::TransmissionMode;

/// Requested execution strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Run in the caller's task and answer with the result.
    Sync,
    /// Enqueue and answer with a job id.
    #[default]
    Async,
}

impl ExecutionMode {
    /// The other execute mode.
    pub fn other(self) -> Self {
        match self {
            Self::Sync => Self::Async,
            Self::Async => Self::Sync,
        }
    }
}

/// Shape of a returned result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// The map of outputs, bare.
    Raw,
    /// The outputs wrapped as `{"outputs": {...}}`.
    #[default]
    Document,
}

/// Per-output delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRequest {
    /// Inline value or link.
    #[serde(default)]
    pub transmission_mode: TransmissionMode,

    /// Requested media type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// The outputs a caller wants, keyed by output name.
///
/// # Examples
///
/// ```
/// use procman::types::{OutputSelection, TransmissionMode};
///
/// let selection: OutputSelection =
///     serde_json::from_str(r#"{"result": {"transmissionMode": "reference"}}"#).unwrap();
/// assert_eq!(selection.names().collect::<Vec<_>>(), vec!["result"]);
/// assert_eq!(selection.0["result"].transmission_mode, TransmissionMode::Reference);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSelection(pub IndexMap<String, OutputRequest>);

impl OutputSelection {
    /// Selects outputs by name, each transmitted by value.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .map(|name| (name.into(), OutputRequest::default()))
                .collect(),
        )
    }

    /// Adds one output with an explicit transmission mode (builder pattern).
    pub fn with(mut self, name: impl Into<String>, mode: TransmissionMode) -> Self {
        self.0.insert(
            name.into(),
            OutputRequest {
                transmission_mode: mode,
                format: None,
            },
        );
        self
    }

    /// Selected output names, in request order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns `true` when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A request to execute one process.
///
/// Only `inputs` participates in the cache fingerprint.
///
/// # Examples
///
/// ```
/// use procman::types::{ExecutionMode, ExecutionRequest, ResponseMode};
/// use serde_json::json;
///
/// let request: ExecutionRequest = serde_json::from_value(json!({
///     "inputs": {"text": "abc"},
///     "mode": "sync",
///     "response": "raw"
/// }))
/// .unwrap();
/// assert_eq!(request.mode, ExecutionMode::Sync);
/// assert_eq!(request.response, ResponseMode::Raw);
/// assert!(request.outputs.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Input values by name. Must be a JSON object.
    #[serde(default = "empty_object")]
    pub inputs: Value,

    /// Outputs to return. `None` means all declared outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputSelection>,

    /// Result shape.
    #[serde(default)]
    pub response: ResponseMode,

    /// Preferred execution strategy.
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl Default for ExecutionRequest {
    fn default() -> Self {
        Self::new(empty_object())
    }
}

impl ExecutionRequest {
    /// An async, document-mode request for all outputs.
    pub fn new(inputs: Value) -> Self {
        Self {
            inputs,
            outputs: None,
            response: ResponseMode::default(),
            mode: ExecutionMode::default(),
        }
    }

    /// Shorthand for a synchronous request.
    pub fn sync(inputs: Value) -> Self {
        Self::new(inputs).with_mode(ExecutionMode::Sync)
    }

    /// Sets the execution mode (builder pattern).
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the output selection (builder pattern).
    pub fn with_outputs(mut self, outputs: OutputSelection) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Sets the response mode (builder pattern).
    pub fn with_response(mut self, response: ResponseMode) -> Self {
        self.response = response;
        self
    }

    /// The shaping part of the request (outputs and response mode), as
    /// stored on job records and replayed when the result is fetched.
    pub fn shaping(&self) -> ResultShaping {
        ResultShaping {
            outputs: self.outputs.clone(),
            response: self.response,
        }
    }
}

/// Output selection and response mode, detached from the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultShaping {
    /// Outputs to return. `None` means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputSelection>,
    /// Result shape.
    #[serde(default)]
    pub response: ResponseMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_async_document_all_outputs() {
        let request: ExecutionRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.mode, ExecutionMode::Async);
        assert_eq!(request.response, ResponseMode::Document);
        assert_eq!(request.inputs, json!({}));
        assert!(request.outputs.is_none());
    }

    #[test]
    fn shaping_survives_storage() {
        let request = ExecutionRequest::new(json!({"text": "abc"}))
            .with_outputs(OutputSelection::default().with("result", TransmissionMode::Reference))
            .with_response(ResponseMode::Raw);
        let stored = serde_json::to_value(request.shaping()).unwrap();
        assert_eq!(
            stored,
            json!({"outputs": {"result": {"transmissionMode": "reference"}}, "response": "raw"})
        );
        let restored: ResultShaping = serde_json::from_value(stored).unwrap();
        assert_eq!(restored, request.shaping());
    }

    #[test]
    fn mode_other_flips() {
        assert_eq!(ExecutionMode::Sync.other(), ExecutionMode::Async);
        assert_eq!(ExecutionMode::Async.other(), ExecutionMode::Sync);
    }
}
