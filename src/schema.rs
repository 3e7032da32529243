//! Minimal argument check against a tool's declared JSON schema.
//!
//! Only `required` and the primitive `type` of declared properties are
//! checked. Undeclared extra fields are accepted.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{field}' should be {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: &'static str,
    },
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        // An integer is also a number.
        "number" => value.is_number(),
        other => type_name(value) == other,
    }
}

/// Check `args` against `schema`. Unknown type keywords are not enforced.
pub fn check_arguments(schema: &Value, args: &Map<String, Value>) -> Result<(), SchemaViolation> {
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);

    for field in required {
        if !args.contains_key(field) {
            return Err(SchemaViolation::MissingField(field.to_string()));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (field, value) in args {
        let Some(expected) = properties
            .get(field)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };

        let known = matches!(
            expected,
            "null" | "boolean" | "integer" | "number" | "string" | "array" | "object"
        );
        if known && !matches_type(value, expected) {
            return Err(SchemaViolation::WrongType {
                field: field.clone(),
                expected: expected.to_string(),
                actual: type_name(value),
            });
        }
    }

    Ok(())
}
