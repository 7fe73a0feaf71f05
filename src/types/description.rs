//! Machine-readable process descriptions.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::request::ExecutionMode;

/// How a process may be executed and controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobControlOption {
    /// Synchronous execution, result returned inline.
    #[serde(rename = "sync-execute")]
    SyncExecute,
    /// Asynchronous execution through the task queue.
    #[serde(rename = "async-execute")]
    AsyncExecute,
    /// Jobs may be dismissed.
    #[serde(rename = "dismiss")]
    Dismiss,
}

/// How an output value is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionMode {
    /// Embedded in the response.
    #[default]
    Value,
    /// Delivered as a link to the result.
    Reference,
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Value => "value",
            Self::Reference => "reference",
        })
    }
}

/// JSON value types an input or output may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl SchemaType {
    /// Returns `true` if `value` has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(s)
    }
}

/// The JSON Schema subset that is enforced on inputs.
///
/// Keywords outside the enforced subset are kept in `extra` so that the
/// description round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Expected value type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,

    /// Minimum string length, in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum string length, in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,

    /// Format hint (`date-time`, `uri`, ...). Carried, not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Any other schema keywords.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schema {
    /// A schema requiring the given type.
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Shorthand for `Schema::of(SchemaType::String)`.
    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    /// Bounds string length (builder pattern).
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Bounds numeric values (builder pattern).
    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Restricts values to an enumeration (builder pattern).
    pub fn with_allowed(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

fn one() -> u32 {
    1
}

fn some_one() -> Option<u32> {
    Some(1)
}

/// Declaration of one process input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescription {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value schema.
    #[serde(default)]
    pub schema: Schema,

    /// Minimum number of occurrences. `0` makes the input optional.
    #[serde(default = "one")]
    pub min_occurs: u32,

    /// Maximum number of occurrences. `None` is unbounded.
    #[serde(default = "some_one")]
    pub max_occurs: Option<u32>,
}

impl InputDescription {
    /// A required, single-valued input.
    pub fn new(schema: Schema) -> Self {
        Self {
            title: None,
            description: None,
            schema,
            min_occurs: 1,
            max_occurs: Some(1),
        }
    }

    /// Sets the title (builder pattern).
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description (builder pattern).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Makes the input optional (`minOccurs = 0`).
    pub fn optional(mut self) -> Self {
        self.min_occurs = 0;
        self
    }

    /// Sets occurrence bounds.
    pub fn with_occurs(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Returns `true` when the input must be supplied.
    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }
}

/// Declaration of one process output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescription {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value schema.
    #[serde(default)]
    pub schema: Schema,
}

impl OutputDescription {
    /// An output with the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            title: None,
            description: None,
            schema,
        }
    }

    /// Sets the title (builder pattern).
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Immutable metadata for one process version.
///
/// # Examples
///
/// ```
/// use procman::types::{InputDescription, OutputDescription, ProcessDescriptor, Schema};
///
/// let descriptor = ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
///     .with_input(
///         "text",
///         InputDescription::new(Schema::string().with_length(Some(1), Some(1000))),
///     )
///     .with_output("result", OutputDescription::new(Schema::string()));
///
/// assert!(descriptor.inputs["text"].is_required());
/// assert_eq!(descriptor.output_names(), vec!["result"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptor {
    /// Process identifier.
    pub id: String,

    /// Version string, compared segment-wise when resolving the latest.
    pub version: String,

    /// Display title.
    pub title: String,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Supported execution and control modes. Empty means all.
    #[serde(default)]
    pub job_control_options: Vec<JobControlOption>,

    /// Supported output transmission modes. Empty means all.
    #[serde(default)]
    pub output_transmission: Vec<TransmissionMode>,

    /// Declared inputs, in declaration order.
    #[serde(default)]
    pub inputs: IndexMap<String, InputDescription>,

    /// Declared outputs, in declaration order.
    #[serde(default)]
    pub outputs: IndexMap<String, OutputDescription>,

    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ProcessDescriptor {
    /// A descriptor supporting sync and async execution, dismissal and both
    /// transmission modes, with no inputs or outputs yet.
    pub fn new(id: impl Into<String>, version: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            title: title.into(),
            description: None,
            job_control_options: vec![
                JobControlOption::SyncExecute,
                JobControlOption::AsyncExecute,
                JobControlOption::Dismiss,
            ],
            output_transmission: vec![TransmissionMode::Value, TransmissionMode::Reference],
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            keywords: Vec::new(),
            metadata: None,
        }
    }

    /// Sets the description (builder pattern).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares an input (builder pattern).
    pub fn with_input(mut self, name: impl Into<String>, input: InputDescription) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    /// Declares an output (builder pattern).
    pub fn with_output(mut self, name: impl Into<String>, output: OutputDescription) -> Self {
        self.outputs.insert(name.into(), output);
        self
    }

    /// Replaces the job control options (builder pattern).
    pub fn with_job_control(mut self, options: Vec<JobControlOption>) -> Self {
        self.job_control_options = options;
        self
    }

    /// Sets keywords (builder pattern).
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets metadata (builder pattern).
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Declared output names, in declaration order.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.keys().map(String::as_str).collect()
    }

    /// Returns `true` if the process accepts execution in `mode`.
    pub fn supports(&self, mode: ExecutionMode) -> bool {
        let option = match mode {
            ExecutionMode::Sync => JobControlOption::SyncExecute,
            ExecutionMode::Async => JobControlOption::AsyncExecute,
        };
        let executes = self.job_control_options.iter().any(|o| {
            matches!(o, JobControlOption::SyncExecute | JobControlOption::AsyncExecute)
        });
        !executes || self.job_control_options.contains(&option)
    }

    /// Returns `true` if outputs may be delivered with `mode`.
    pub fn supports_transmission(&self, mode: TransmissionMode) -> bool {
        self.output_transmission.is_empty() || self.output_transmission.contains(&mode)
    }

    /// Picks the execution mode actually used for a request: the requested
    /// one if supported, otherwise the other execute mode.
    pub fn negotiate(&self, requested: ExecutionMode) -> ExecutionMode {
        if self.supports(requested) {
            requested
        } else {
            requested.other()
        }
    }
}
