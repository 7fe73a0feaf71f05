//! Content fingerprints for calculation tasks.
//!
//! A fingerprint is the lowercase hex SHA-256 of the inputs serialized as
//! JSON with object keys sorted at every depth. It depends only on the input
//! values, never on key insertion order, the output selection or the
//! response mode, so identical requests land on the same cache entry.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::types::request::ExecutionRequest;

/// Returns the canonical form of `value`: objects rebuilt with sorted keys,
/// recursively. Arrays keep their order.
///
/// # Examples
///
/// ```
/// use procman::fingerprint::canonicalize;
/// use serde_json::json;
///
/// let canonical = canonicalize(&json!({"b": 1, "a": {"d": 2, "c": 3}}));
/// assert_eq!(canonical.to_string(), r#"{"a":{"c":3,"d":2},"b":1}"#);
/// ```
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Fingerprints a set of inputs.
///
/// # Examples
///
/// ```
/// use procman::fingerprint::fingerprint;
/// use serde_json::json;
///
/// let a = fingerprint(&json!({"x": 1, "y": [1, 2]}));
/// let b = fingerprint(&json!({"y": [1, 2], "x": 1}));
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn fingerprint(inputs: &Value) -> String {
    let canonical = canonicalize(inputs).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest.as_slice())
}

/// A single invocation of a process: what was asked for, and its
/// fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationTask {
    /// Process the task runs.
    pub process_id: String,
    /// The request as received.
    pub request: ExecutionRequest,
    fingerprint: String,
}

impl CalculationTask {
    /// Builds a task and computes its fingerprint.
    pub fn new(process_id: impl Into<String>, request: ExecutionRequest) -> Self {
        let fingerprint = fingerprint(&request.inputs);
        Self {
            process_id: process_id.into(),
            request,
            fingerprint,
        }
    }

    /// The cache key for this task's result.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
