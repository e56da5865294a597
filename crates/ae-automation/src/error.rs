//! Automation errors

use ae_core::{codes, ErrorData};
use ae_data::DataError;
use ae_providers::ProviderError;
use ae_script::ActionError;
use thiserror::Error;

/// Result type for automation operations
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Automation errors
#[derive(Debug, Clone, Error)]
pub enum AutomationError {
    /// The configuration could not be parsed or failed validation
    #[error("Invalid automation configuration: {0}")]
    Configuration(ErrorData),

    /// A request validation error of the matched HTTP trigger
    #[error("Request rejected: {0}")]
    RequestRejected(ErrorData),

    /// An action failed and nothing handled it
    #[error("Action error: {0}")]
    Action(ActionError),

    /// A trigger or automation condition could not be resolved
    #[error("Condition error: {0}")]
    Condition(ProviderError),

    #[error("Automation data error: {0}")]
    Data(ErrorData),

    #[error("Automation cancelled")]
    Cancelled,
}

impl AutomationError {
    /// The payload returned to the caller
    pub fn error_data(&self) -> ErrorData {
        match self {
            AutomationError::Configuration(data)
            | AutomationError::RequestRejected(data)
            | AutomationError::Data(data) => data.clone(),
            AutomationError::Action(err) => err.error_data(),
            AutomationError::Condition(err) => err.error_data(),
            AutomationError::Cancelled => ErrorData::cancelled(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AutomationError::Cancelled)
    }
}

impl From<ActionError> for AutomationError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Cancelled => AutomationError::Cancelled,
            other => AutomationError::Action(other),
        }
    }
}

impl From<ProviderError> for AutomationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => AutomationError::Cancelled,
            other => AutomationError::Condition(other),
        }
    }
}

impl From<DataError> for AutomationError {
    fn from(err: DataError) -> Self {
        AutomationError::Data(err.to_error_data())
    }
}

impl From<AutomationError> for ErrorData {
    fn from(err: AutomationError) -> Self {
        err.error_data()
    }
}

/// Which alias collided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    Automation,
    Trigger,
    Action,
}

impl AliasKind {
    fn code(self) -> &'static str {
        match self {
            AliasKind::Automation => codes::DISTINCT_AUTOMATION_ALIAS,
            AliasKind::Trigger => codes::DISTINCT_TRIGGER_ALIAS,
            AliasKind::Action => codes::DISTINCT_ACTION_ALIAS,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AliasKind::Automation => "automation",
            AliasKind::Trigger => "trigger",
            AliasKind::Action => "action",
        }
    }
}

/// Validation failure for a repeated alias
pub fn duplicate_alias(kind: AliasKind, alias: &str) -> ErrorData {
    ErrorData::new(
        kind.code(),
        "Duplicate alias",
        format!(
            "Each {} should have a distinct alias, but \"{}\" is used more than once.",
            kind.name(),
            alias
        ),
        400,
    )
    .with_detail(format!("Alias: {}", alias))
}

/// First alias that occurs more than once, in declaration order
pub fn first_duplicate<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    aliases.into_iter().find(|alias| !seen.insert(*alias))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_duplicate() {
        assert_eq!(first_duplicate(["a", "b", "c"]), None);
        assert_eq!(first_duplicate(["a", "b", "a", "b"]), Some("a"));
    }

    #[test]
    fn test_duplicate_alias_payload() {
        let error = duplicate_alias(AliasKind::Trigger, "onQuote");
        assert_eq!(error.code, codes::DISTINCT_TRIGGER_ALIAS);
        assert_eq!(error.http_status_code, 400);
        assert_eq!(error.additional_details, vec!["Alias: onQuote"]);
    }

    #[test]
    fn test_cancellation_is_preserved() {
        let err: AutomationError = ActionError::Cancelled.into();
        assert!(err.is_cancelled());
        assert_eq!(err.error_data().code, codes::CANCELLED);
    }
}
