//! Action errors

use ae_core::ErrorData;
use ae_data::DataError;
use ae_providers::ProviderError;
use thiserror::Error;

/// Result type for action execution
pub type ActionResult<T> = Result<T, ActionError>;

/// Why an action failed
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// Raised by configuration: an error condition matched, or a
    /// `raiseErrorAction` ran
    #[error("{0}")]
    Raised(ErrorData),

    /// A configured value could not be resolved
    #[error("{0}")]
    Resolution(ProviderError),

    /// A collaborator (HTTP, email, events, jobs) failed
    #[error("{0}")]
    Capability(ErrorData),

    /// The execution context rejected an update
    #[error("{0}")]
    Data(ErrorData),

    #[error("action cancelled")]
    Cancelled,
}

impl ActionError {
    pub fn error_data(&self) -> ErrorData {
        match self {
            ActionError::Raised(data) | ActionError::Capability(data) | ActionError::Data(data) => {
                data.clone()
            }
            ActionError::Resolution(err) => err.error_data(),
            ActionError::Cancelled => ErrorData::cancelled(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled)
    }
}

impl From<ProviderError> for ActionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => ActionError::Cancelled,
            other => ActionError::Resolution(other),
        }
    }
}

impl From<DataError> for ActionError {
    fn from(err: DataError) -> Self {
        ActionError::Data(err.to_error_data())
    }
}

impl From<ActionError> for ErrorData {
    fn from(err: ActionError) -> Self {
        err.error_data()
    }
}
