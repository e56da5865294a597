//! Helpers shared by every configuration builder

use ae_core::{codes, ErrorData};
use serde_json::{Map, Value};

/// Result of parsing a configuration node
pub type BuildResult<T> = Result<T, ErrorData>;

/// A malformed configuration node
pub fn malformed(node_kind: &str, message: impl Into<String>) -> ErrorData {
    ErrorData::new(
        codes::MALFORMED_CONFIGURATION,
        "Malformed configuration",
        message,
        400,
    )
    .with_detail(format!("Node kind: {}", node_kind))
}

/// A required property is absent
pub fn missing_property(property: &str, node_kind: &str) -> ErrorData {
    ErrorData::new(
        codes::MISSING_PROPERTY,
        "Missing property",
        format!("A {} requires the property \"{}\".", node_kind, property),
        400,
    )
    .with_detail(format!("Property: {}", property))
    .with_detail(format!("Node kind: {}", node_kind))
}

pub fn as_object<'a>(value: &'a Value, node_kind: &str) -> BuildResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| malformed(node_kind, format!("A {} must be a JSON object.", node_kind)))
}

pub fn as_array<'a>(value: &'a Value, node_kind: &str) -> BuildResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| malformed(node_kind, format!("A {} must be a JSON array.", node_kind)))
}

pub fn required<'a>(
    object: &'a Map<String, Value>,
    property: &str,
    node_kind: &str,
) -> BuildResult<&'a Value> {
    object
        .get(property)
        .ok_or_else(|| missing_property(property, node_kind))
}

pub fn required_str<'a>(
    object: &'a Map<String, Value>,
    property: &str,
    node_kind: &str,
) -> BuildResult<&'a str> {
    match required(object, property, node_kind)? {
        Value::String(s) => Ok(s.as_str()),
        _ => Err(malformed(
            node_kind,
            format!("The property \"{}\" of a {} must be text.", property, node_kind),
        )),
    }
}

pub fn optional_str<'a>(
    object: &'a Map<String, Value>,
    property: &str,
    node_kind: &str,
) -> BuildResult<Option<&'a str>> {
    match object.get(property) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(malformed(
            node_kind,
            format!("The property \"{}\" of a {} must be text.", property, node_kind),
        )),
    }
}

pub fn optional_bool(
    object: &Map<String, Value>,
    property: &str,
    default: bool,
    node_kind: &str,
) -> BuildResult<bool> {
    match object.get(property) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(malformed(
            node_kind,
            format!("The property \"{}\" of a {} must be a boolean.", property, node_kind),
        )),
    }
}
