//! Custom filters, tests and functions for automation templates

use minijinja::value::{Kwargs, Value, ValueKind};
use minijinja::{Error, ErrorKind};
use regex::Regex;

fn value_to_f64(value: &Value) -> Option<f64> {
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

// ==================== String Filters ====================

/// Replace matches of a regex pattern with a replacement string
pub fn regex_replace(value: &str, find: &str, replace: &str) -> Result<String, Error> {
    let re = Regex::new(find).map_err(|e| invalid(format!("invalid regex: {}", e)))?;
    Ok(re.replace_all(value, replace).to_string())
}

/// Test if a regex pattern matches
pub fn regex_match(value: &str, pattern: &str) -> Result<bool, Error> {
    let re = Regex::new(pattern).map_err(|e| invalid(format!("invalid regex: {}", e)))?;
    Ok(re.is_match(value))
}

// ==================== Type Conversion Filters ====================

/// Convert value to float, falling back to `default` when it is not numeric
pub fn to_float(value: Value, default: Option<f64>) -> Result<Value, Error> {
    let parsed = value_to_f64(&value).or_else(|| value.as_str()?.trim().parse::<f64>().ok());
    match (parsed, default) {
        (Some(f), _) => Ok(Value::from(f)),
        (None, Some(d)) => Ok(Value::from(d)),
        (None, None) => Err(invalid(format!("cannot convert '{}' to float", value))),
    }
}

/// Convert value to integer, falling back to `default` when it is not numeric
pub fn to_int(value: Value, default: Option<i64>) -> Result<Value, Error> {
    let parsed = value
        .as_i64()
        .or_else(|| value_to_f64(&value).map(|f| f as i64))
        .or_else(|| value.as_str()?.trim().parse::<i64>().ok());
    match (parsed, default) {
        (Some(i), _) => Ok(Value::from(i)),
        (None, Some(d)) => Ok(Value::from(d)),
        (None, None) => Err(invalid(format!("cannot convert '{}' to int", value))),
    }
}

/// Convert value to boolean
pub fn to_bool(value: Value) -> bool {
    if let Some(s) = value.as_str() {
        return matches!(s.to_lowercase().as_str(), "true" | "yes" | "on" | "1");
    }
    value.is_true()
}

// ==================== Type Checking ====================

/// Check if value is a number (integer or float)
pub fn is_number(value: Value) -> bool {
    value.kind() == ValueKind::Number
}

/// Check if value is a list/sequence
pub fn is_list(value: Value) -> bool {
    matches!(value.kind(), ValueKind::Seq | ValueKind::Iterable)
}

/// Check if a string or list contains a value
pub fn contains(value: Value, search: Value) -> bool {
    if let (Some(haystack), Some(needle)) = (value.as_str(), search.as_str()) {
        return haystack.contains(needle);
    }
    match value.try_iter() {
        Ok(mut iter) => iter.any(|item| item == search),
        Err(_) => false,
    }
}

// ==================== Math ====================

/// Round a number to specified precision
pub fn round_filter(value: f64, precision: Option<i32>, kwargs: Kwargs) -> Result<f64, Error> {
    let precision = precision.unwrap_or(0);
    let method: String = kwargs
        .get::<Option<String>>("method")?
        .unwrap_or_else(|| "common".to_string());
    kwargs.assert_all_used()?;

    let multiplier = 10_f64.powi(precision);
    let scaled = value * multiplier;

    let rounded = match method.as_str() {
        "ceil" => scaled.ceil(),
        "floor" => scaled.floor(),
        _ => scaled.round(),
    };

    Ok(rounded / multiplier)
}

// ==================== JSON ====================

/// Convert value to JSON string
pub fn to_json(value: Value, kwargs: Kwargs) -> Result<String, Error> {
    let pretty: bool = kwargs.get::<Option<bool>>("pretty")?.unwrap_or(false);
    kwargs.assert_all_used()?;

    if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| invalid(format!("JSON error: {}", e)))
}

/// Parse JSON string to value
pub fn from_json(value: &str) -> Result<Value, Error> {
    let json: serde_json::Value =
        serde_json::from_str(value).map_err(|e| invalid(format!("invalid JSON: {}", e)))?;
    Ok(Value::from_serialize(&json))
}

// ==================== Functions ====================

/// Inline if
pub fn iif(condition: Value, if_true: Option<Value>, if_false: Option<Value>) -> Value {
    if condition.is_true() {
        if_true.unwrap_or(Value::from(true))
    } else {
        if_false.unwrap_or(Value::from(false))
    }
}

/// Name of a value's type
pub fn typeof_fn(value: Value) -> &'static str {
    match value.kind() {
        ValueKind::Undefined => "undefined",
        ValueKind::None => "none",
        ValueKind::Bool => "boolean",
        ValueKind::String => "string",
        ValueKind::Number if value.as_i64().is_some() => "integer",
        ValueKind::Number => "float",
        ValueKind::Seq | ValueKind::Iterable => "list",
        ValueKind::Map => "mapping",
        _ => "object",
    }
}
