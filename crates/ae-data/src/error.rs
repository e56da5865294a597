//! Error types for execution context operations

use ae_core::pointer::PointerError;
use ae_core::ErrorData;
use thiserror::Error;

/// Result type for execution context operations
pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Pointer(#[from] PointerError),

    #[error("execution context serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("no action record at '{0}'")]
    ActionNotFound(String),

    #[error("action record cannot hold '{0}'")]
    ContainerMissing(String),

    #[error("invalid variable path '{0}'")]
    InvalidVariablePath(String),
}

impl DataError {
    /// Convert to the structured payload surfaced to callers
    pub fn to_error_data(&self) -> ErrorData {
        match self {
            DataError::Pointer(err) => err.to_error_data(),
            other => ErrorData::engine_error(other.to_string()),
        }
    }
}

impl From<DataError> for ErrorData {
    fn from(err: DataError) -> Self {
        err.to_error_data()
    }
}
