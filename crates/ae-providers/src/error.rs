//! Error types for value resolution

use ae_core::{codes, ErrorData};
use ae_data::DataError;
use ae_template::TemplateError;
use thiserror::Error;

/// Result type for resolution
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while resolving a value
///
/// Each variant carries the payload surfaced to callers. The variant tells
/// callers which fallback, if any, applies.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Nothing at the path and no fallback configured
    #[error("{0}")]
    PathNotFound(ErrorData),

    /// The path could not be walked
    #[error("{0}")]
    PathResolution(ErrorData),

    /// A value did not have the expected type
    #[error("{0}")]
    InvalidType(ErrorData),

    #[error("{0}")]
    Expression(ErrorData),

    #[error("{0}")]
    Template(ErrorData),

    #[error("{0}")]
    EntityNotFound(ErrorData),

    /// A capability call failed
    #[error("{0}")]
    Capability(ErrorData),

    #[error("resolution cancelled")]
    Cancelled,
}

impl ProviderError {
    /// The payload surfaced to callers
    pub fn error_data(&self) -> ErrorData {
        match self {
            ProviderError::Cancelled => ErrorData::cancelled(),
            ProviderError::PathNotFound(data)
            | ProviderError::PathResolution(data)
            | ProviderError::InvalidType(data)
            | ProviderError::Expression(data)
            | ProviderError::Template(data)
            | ProviderError::EntityNotFound(data)
            | ProviderError::Capability(data) => data.clone(),
        }
    }

    /// Append a diagnostic line to the payload
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match self {
            ProviderError::PathNotFound(d) => ProviderError::PathNotFound(d.with_detail(detail)),
            ProviderError::PathResolution(d) => {
                ProviderError::PathResolution(d.with_detail(detail))
            }
            ProviderError::InvalidType(d) => ProviderError::InvalidType(d.with_detail(detail)),
            ProviderError::Expression(d) => ProviderError::Expression(d.with_detail(detail)),
            ProviderError::Template(d) => ProviderError::Template(d.with_detail(detail)),
            ProviderError::EntityNotFound(d) => {
                ProviderError::EntityNotFound(d.with_detail(detail))
            }
            ProviderError::Capability(d) => ProviderError::Capability(d.with_detail(detail)),
            ProviderError::Cancelled => ProviderError::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    pub fn invalid_type(what: &str, expected: &str, actual: &serde_json::Value) -> Self {
        ProviderError::InvalidType(ErrorData::invalid_type(what, expected, kind_name(actual)))
    }

    pub fn template(err: TemplateError, template: &str) -> Self {
        ProviderError::Template(
            ErrorData::new(
                codes::TEMPLATE_FAILED,
                "Template rendering failed",
                err.to_string(),
                500,
            )
            .with_detail(format!("Template: {}", template)),
        )
    }

    pub fn expression(message: impl Into<String>, expression: &str) -> Self {
        ProviderError::Expression(
            ErrorData::new(
                codes::EXPRESSION_FAILED,
                "Expression evaluation failed",
                message,
                500,
            )
            .with_detail(format!("Expression: {}", expression)),
        )
    }
}

impl From<DataError> for ProviderError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Pointer(p) => ProviderError::PathResolution(p.to_error_data()),
            other => ProviderError::Capability(other.to_error_data()),
        }
    }
}

impl From<ProviderError> for ErrorData {
    fn from(err: ProviderError) -> Self {
        err.error_data()
    }
}

/// JSON type name used in diagnostics
pub fn kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "number",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "text",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
