//! Input and output validation against a [`ProcessDescriptor`].
//!
//! Input checks run in declaration order and stop at the first violation:
//! required inputs first, then the value type, occurrence bounds, string
//! length, numeric range and enumeration. Inputs the descriptor does not
//! declare are passed through untouched.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{InputDescription, OutputSelection, ProcessDescriptor, Schema};

/// Validates `inputs` against the declared inputs of `descriptor`.
///
/// `null` counts as absent.
///
/// # Errors
///
/// [`Error::InputValidation`] naming the first offending input.
///
/// # Examples
///
/// ```
/// use procman::process::validation::validate_inputs;
/// use procman::types::{InputDescription, ProcessDescriptor, Schema};
/// use serde_json::json;
///
/// let descriptor = ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
///     .with_input("text", InputDescription::new(Schema::string()));
///
/// assert!(validate_inputs(&descriptor, &json!({"text": "abc"})).is_ok());
/// assert!(validate_inputs(&descriptor, &json!({})).is_err());
/// assert!(validate_inputs(&descriptor, &json!({"text": 5})).is_err());
/// ```
pub fn validate_inputs(descriptor: &ProcessDescriptor, inputs: &Value) -> Result<()> {
    let Some(values) = inputs.as_object() else {
        return Err(Error::input_validation("inputs", "object", type_name(inputs)));
    };

    for (name, declared) in &descriptor.inputs {
        match values.get(name) {
            None | Some(Value::Null) => {
                if declared.is_required() {
                    return Err(Error::missing_input(name));
                }
            },
            Some(value) => validate_input(name, declared, value)?,
        }
    }
    Ok(())
}

fn validate_input(name: &str, declared: &InputDescription, value: &Value) -> Result<()> {
    let multi = declared.max_occurs.map_or(true, |max| max > 1);
    match value {
        // A declared array type is a single occurrence, not a repetition.
        Value::Array(items) if multi && !declares_array(&declared.schema) => {
            let count = u32::try_from(items.len()).unwrap_or(u32::MAX);
            if count < declared.min_occurs {
                return Err(occurs_error(name, declared, count));
            }
            if let Some(max) = declared.max_occurs {
                if count > max {
                    return Err(occurs_error(name, declared, count));
                }
            }
            items
                .iter()
                .try_for_each(|item| validate_value(name, &declared.schema, item))
        },
        _ => validate_value(name, &declared.schema, value),
    }
}

fn declares_array(schema: &Schema) -> bool {
    schema.kind == Some(crate::types::SchemaType::Array)
}

fn occurs_error(name: &str, declared: &InputDescription, count: u32) -> Error {
    let expected = match declared.max_occurs {
        Some(max) => format!("between {} and {max} values", declared.min_occurs),
        None => format!("at least {} values", declared.min_occurs),
    };
    Error::input_validation(name, expected, format!("{count} values"))
}

fn validate_value(name: &str, schema: &Schema, value: &Value) -> Result<()> {
    if let Some(kind) = schema.kind {
        if !kind.matches(value) {
            return Err(Error::input_validation(name, kind.to_string(), type_name(value)));
        }
    }

    if let Some(text) = value.as_str() {
        let length = text.chars().count();
        if let Some(min) = schema.min_length {
            if length < min {
                return Err(Error::input_validation(
                    name,
                    format!("at least {min} characters"),
                    format!("{length} characters"),
                ));
            }
        }
        if let Some(max) = schema.max_length {
            if length > max {
                return Err(Error::input_validation(
                    name,
                    format!("at most {max} characters"),
                    format!("{length} characters"),
                ));
            }
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.minimum {
            if number < min {
                return Err(Error::input_validation(name, format!(">= {min}"), number.to_string()));
            }
        }
        if let Some(max) = schema.maximum {
            if number > max {
                return Err(Error::input_validation(name, format!("<= {max}"), number.to_string()));
            }
        }
    }

    if let Some(allowed) = &schema.allowed {
        if !allowed.contains(value) {
            let expected = allowed
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::input_validation(
                name,
                format!("one of {expected}"),
                value.to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates an output selection against the declared outputs.
///
/// `None` and an empty selection both mean "all outputs".
///
/// # Errors
///
/// [`Error::OutputValidation`] if the process declares no outputs, if the
/// selection names outputs it does not declare, or if it asks for a
/// transmission mode the process does not offer.
pub fn validate_outputs(
    descriptor: &ProcessDescriptor,
    selection: Option<&OutputSelection>,
) -> Result<()> {
    let available: Vec<String> = descriptor.outputs.keys().cloned().collect();
    if available.is_empty() {
        return Err(Error::OutputValidation {
            invalid: Vec::new(),
            available,
            message: format!("process {} declares no outputs", descriptor.id),
        });
    }

    let Some(selection) = selection else {
        return Ok(());
    };
    let invalid: Vec<String> = selection
        .names()
        .filter(|name| !descriptor.outputs.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !invalid.is_empty() {
        return Err(Error::unknown_outputs(invalid, available));
    }

    let unsupported: Vec<String> = selection
        .0
        .iter()
        .filter(|(_, request)| !descriptor.supports_transmission(request.transmission_mode))
        .map(|(name, _)| name.clone())
        .collect();
    if unsupported.is_empty() {
        return Ok(());
    }
    let offered: Vec<String> = descriptor
        .output_transmission
        .iter()
        .map(|mode| mode.to_string())
        .collect();
    Err(Error::OutputValidation {
        message: format!(
            "process {} cannot transmit output(s) {} as requested; it offers: {}",
            descriptor.id,
            unsupported.join(", "),
            offered.join(", ")
        ),
        invalid: unsupported,
        available,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
