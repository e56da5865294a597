//! Structured error payload surfaced to callers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codes;

/// Error payload carried by every surfaced failure
///
/// `additional_details` is an ordered list of diagnostic lines appended by
/// whichever component raised (or re-raised) the error, for example
/// `"Entity Type: quote"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    /// Machine-readable code, see [`crate::codes`]
    pub code: String,

    /// Short human-readable title
    pub title: String,

    /// Human-readable message
    pub message: String,

    /// HTTP status returned to an HTTP caller
    pub http_status_code: u16,

    /// Ordered diagnostic lines
    #[serde(default)]
    pub additional_details: Vec<String>,

    /// Optional structured data attached by configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorData {
    /// Create a new error payload
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        http_status_code: u16,
    ) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            message: message.into(),
            http_status_code,
            additional_details: Vec::new(),
            data: None,
        }
    }

    /// Append a diagnostic line
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.additional_details.push(detail.into());
        self
    }

    /// Append several diagnostic lines, keeping their order
    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_details
            .extend(details.into_iter().map(Into::into));
        self
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn path_not_found(path: &str) -> Self {
        Self::new(
            codes::PATH_NOT_FOUND,
            "Path not found",
            format!("When trying to resolve the path \"{}\", nothing was found.", path),
            500,
        )
        .with_detail(format!("Path: {}", path))
    }

    pub fn invalid_type(path_or_value: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            codes::INVALID_TYPE,
            "Invalid value type",
            format!(
                "Expected a value of type \"{}\" but \"{}\" resolved to a value of type \"{}\".",
                expected, path_or_value, actual
            ),
            500,
        )
        .with_detail(format!("Expected type: {}", expected))
        .with_detail(format!("Actual type: {}", actual))
    }

    pub fn cancelled() -> Self {
        Self::new(
            codes::CANCELLED,
            "Automation cancelled",
            "The request that started this automation was cancelled.",
            499,
        )
    }

    pub fn trigger_not_found(description: &str) -> Self {
        Self::new(
            codes::TRIGGER_NOT_FOUND,
            "No matching automation",
            format!("No automation trigger matched {}.", description),
            404,
        )
    }

    /// Generic failure used when configuration did not anticipate the error
    pub fn engine_error(message: impl Into<String>) -> Self {
        Self::new(codes::ENGINE_ERROR, "Automation failed", message, 500)
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.title, self.code, self.message)
    }
}

impl std::error::Error for ErrorData {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_data_is_omitted() {
        let error = ErrorData::new("some.code", "Title", "Message", 400);
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["code"], "some.code");
        assert_eq!(json["httpStatusCode"], 400);
        assert!(json.get("data").is_none());
        assert_eq!(json["additionalDetails"], serde_json::json!([]));
    }

    #[test]
    fn test_details_keep_order() {
        let error = ErrorData::path_not_found("/trigger/x")
            .with_detail("Entity Type: quote")
            .with_details(["Entity ID: 1", "Extra"]);

        assert_eq!(
            error.additional_details,
            vec![
                "Path: /trigger/x",
                "Entity Type: quote",
                "Entity ID: 1",
                "Extra"
            ]
        );
        assert_eq!(error.code, codes::PATH_NOT_FOUND);
    }
}
