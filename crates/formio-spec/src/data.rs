use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_cbor::{to_vec, value::to_value};
use serde_json::{Map, Value};

use crate::error::FormError;

/// Form data snapshot: field key to value.
pub type FormData = Map<String, Value>;

/// Converts a JSON document into a snapshot; `null` counts as empty.
pub fn data_from_value(value: Value) -> Result<FormData, FormError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(FormData::new()),
        Value::Bool(_) => Err(FormError::DataShape("a boolean")),
        Value::Number(_) => Err(FormError::DataShape("a number")),
        Value::String(_) => Err(FormError::DataShape("a string")),
        Value::Array(_) => Err(FormError::DataShape("an array")),
    }
}

/// Absent, `null`, `""`, or an empty list.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Strict equality between two possibly-absent values. Numbers compare by
/// magnitude so `5` and `5.0` are equal; containers compare element-wise.
pub fn strict_equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => values_equal(left, right),
        _ => false,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| values_equal(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| values_equal(value, other))
                })
        }
        _ => left == right,
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    /// Field key; grid cells use `grid[row].field`.
    pub field: String,
    pub message: String,
    /// Stable rule identifier such as `required` or `max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: Some(code.to_string()),
        }
    }
}

/// Accepted submission handed to `on_submit` consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub data: FormData,
}

impl Submission {
    pub fn new(title: Option<String>, data: FormData) -> Self {
        Self { title, data }
    }

    /// Serializes the submission as canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        let canonical = to_value(self)?;
        to_vec(&canonical)
    }

    /// Serializes the submission as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
