//! Flattening of resource state into a string-keyed attribute map.
//!
//! Nested objects become single-element lists, matching how declarative
//! engines model nested blocks. Null attributes are dropped.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::vpc::VpcError;

/// Converts `state` into an attribute map.
///
/// # Errors
///
/// Returns [`VpcError::Decode`] when `state` does not serialise to a JSON
/// object.
pub fn to_attributes<S: Serialize + ?Sized>(state: &S) -> Result<Map<String, Value>, VpcError> {
    match serde_json::to_value(state).map_err(|err| VpcError::decode(&err))? {
        Value::Object(fields) => Ok(flatten_object(fields)),
        other => Err(VpcError::Decode {
            message: format!("state must be an object, got {other}"),
        }),
    }
}

fn flatten_object(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key, flatten_value(value)))
        .collect()
}

fn flatten_value(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Array(vec![Value::Object(flatten_object(fields))]),
        Value::Array(items) => Value::Array(items.into_iter().map(flatten_element).collect()),
        scalar => scalar,
    }
}

fn flatten_element(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(flatten_object(fields)),
        other => flatten_value(other),
    }
}
