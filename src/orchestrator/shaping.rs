//! Result shaping: output selection, transmission mode and response mode.

use serde_json::{json, Map, Value};

use crate::types::{ResponseMode, ResultShaping, TransmissionMode};

/// Link relation for by-reference outputs.
pub const REL_RESULT: &str = "result";

/// Shapes the outputs of job `job_id` the way the request asked.
///
/// Selected outputs appear in request order; names the result does not
/// contain are skipped. With no selection every output is returned by
/// value. A result that is not a JSON object is not filtered.
pub fn shape(value: &Value, shaping: &ResultShaping, job_id: &str, base_path: &str) -> Value {
    let outputs = match value {
        Value::Object(all) => Value::Object(select(all, shaping, job_id, base_path)),
        other => other.clone(),
    };
    match shaping.response {
        ResponseMode::Raw => outputs,
        ResponseMode::Document => json!({ "outputs": outputs }),
    }
}

fn select(
    all: &Map<String, Value>,
    shaping: &ResultShaping,
    job_id: &str,
    base_path: &str,
) -> Map<String, Value> {
    let Some(selection) = shaping.outputs.as_ref().filter(|s| !s.is_empty()) else {
        return all.clone();
    };
    selection
        .0
        .iter()
        .filter_map(|(name, request)| {
            let value = all.get(name)?;
            let shaped = match request.transmission_mode {
                TransmissionMode::Value => value.clone(),
                TransmissionMode::Reference => reference(name, job_id, base_path),
            };
            Some((name.clone(), shaped))
        })
        .collect()
}

fn reference(name: &str, job_id: &str, base_path: &str) -> Value {
    let base = base_path.trim_end_matches('/');
    json!({
        "href": format!("{base}/jobs/{job_id}/results/{name}"),
        "rel": REL_RESULT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputSelection;
    use pretty_assertions::assert_eq;

    fn result() -> Value {
        json!({"result": "ABC", "length": 3})
    }

    #[test]
    fn document_mode_wraps_all_outputs() {
        let shaped = shape(&result(), &ResultShaping::default(), "j1", "");
        assert_eq!(shaped, json!({"outputs": {"result": "ABC", "length": 3}}));
    }

    #[test]
    fn raw_mode_filters_to_the_selection() {
        let shaping = ResultShaping {
            outputs: Some(OutputSelection::from_names(["length"])),
            response: ResponseMode::Raw,
        };
        assert_eq!(shape(&result(), &shaping, "j1", ""), json!({"length": 3}));
    }

    #[test]
    fn reference_outputs_become_links() {
        let shaping = ResultShaping {
            outputs: Some(
                OutputSelection::default()
                    .with("result", TransmissionMode::Reference)
                    .with("length", TransmissionMode::Value),
            ),
            response: ResponseMode::Raw,
        };
        assert_eq!(
            shape(&result(), &shaping, "j1", "/api/"),
            json!({
                "result": {"href": "/api/jobs/j1/results/result", "rel": "result"},
                "length": 3
            })
        );
    }

    #[test]
    fn non_object_results_pass_through() {
        let shaping = ResultShaping {
            outputs: Some(OutputSelection::from_names(["x"])),
            response: ResponseMode::Raw,
        };
        assert_eq!(shape(&json!(42), &shaping, "j1", ""), json!(42));
    }
}
