//! Schema validation for model JSON output.
//!
//! Model output is untrusted and often *almost* correct, so callers
//! run the lenient [`normalize`] coercion first and this strict
//! validation second. The two phases are separate functions on
//! purpose; neither weakens the other's contract.

pub mod normalize;

pub use normalize::normalize;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Character budget for the invalid-output excerpt in a repair prompt.
const EXCERPT_BUDGET: usize = 500;

/// One field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid { data: Value },
    Invalid { issues: Vec<ValidationIssue> },
}

/// Structural validation: types, required fields, enumerated value
/// sets, array length bounds, numeric ranges, string lengths.
///
/// Failures produce per-field `(path, message)` pairs so callers can
/// build a repair prompt or fall back deterministically.
pub fn validate(value: &Value, schema: &Value) -> ValidationOutcome {
    let mut issues = Vec::new();
    check_value("$", value, schema, &mut issues);
    if issues.is_empty() {
        ValidationOutcome::Valid {
            data: value.clone(),
        }
    } else {
        ValidationOutcome::Invalid { issues }
    }
}

fn check_value(path: &str, value: &Value, schema: &Value, issues: &mut Vec<ValidationIssue>) {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            issues.push(ValidationIssue::new(
                path,
                format!(
                    "expected type '{expected}', got {}",
                    json_type_name(value)
                ),
            ));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            issues.push(ValidationIssue::new(
                path,
                format!(
                    "{} is not one of the allowed values {}",
                    value,
                    serde_json::Value::Array(allowed.clone())
                ),
            ));
        }
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for field in required {
                    if let Some(name) = field.as_str() {
                        if !map.contains_key(name) {
                            issues.push(ValidationIssue::new(
                                format!("{path}.{name}"),
                                "missing required field",
                            ));
                        }
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, child) in map {
                    if let Some(child_schema) = properties.get(key) {
                        check_value(&format!("{path}.{key}"), child, child_schema, issues);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must have at least {min} items, got {}", items.len()),
                    ));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
                if (items.len() as u64) > max {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must have at most {max} items, got {}", items.len()),
                    ));
                }
            }
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check_value(&format!("{path}[{i}]"), item, item_schema, issues);
                }
            }
        }
        Value::Number(n) => {
            if let (Some(min), Some(actual)) =
                (schema.get("minimum").and_then(Value::as_f64), n.as_f64())
            {
                if actual < min {
                    issues.push(ValidationIssue::new(path, format!("must be >= {min}")));
                }
            }
            if let (Some(max), Some(actual)) =
                (schema.get("maximum").and_then(Value::as_f64), n.as_f64())
            {
                if actual > max {
                    issues.push(ValidationIssue::new(path, format!("must be <= {max}")));
                }
            }
        }
        Value::String(s) => {
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if (s.chars().count() as u64) > max {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must be at most {max} characters"),
                    ));
                }
            }
        }
        _ => {}
    }
}

/// Compose a follow-up instruction embedding the validation issues and
/// a truncated excerpt of the invalid output, asking for a corrected
/// JSON-only response. Used for at most one repair cycle.
pub fn build_repair_prompt(
    original_prompt: &str,
    invalid_output: &str,
    issues: &[ValidationIssue],
) -> String {
    let mut bullets = String::new();
    for issue in issues {
        bullets.push_str(&format!("- {}: {}\n", issue.path, issue.message));
    }
    let excerpt = normalize::truncate_chars(invalid_output, EXCERPT_BUDGET);
    format!(
        "Your previous response did not match the required JSON shape.\n\
         Problems:\n{bullets}\n\
         Invalid response (may be truncated):\n{excerpt}\n\n\
         Original request:\n{original_prompt}\n\n\
         Reply again with ONLY a single corrected JSON document. \
         No markdown fences, no commentary."
    )
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
