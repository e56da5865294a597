//! Engine error types

use ae_automation::AutomationError;
use ae_config::ConfigError;
use ae_core::{codes, ErrorData};
use ae_data::DataError;
use thiserror::Error;

use crate::release::ReleaseKey;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the engine outside of an automation run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no configuration registered for release {0}")]
    NotRegistered(ReleaseKey),

    #[error("automation '{0}' not found")]
    AutomationNotFound(String),

    #[error("trigger '{trigger_alias}' of automation '{automation_alias}' is not periodic")]
    NotPeriodic {
        automation_alias: String,
        trigger_alias: String,
    },

    #[error("background worker already started")]
    WorkerAlreadyStarted,

    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{}", .0.error_data())]
    Automation(#[from] AutomationError),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] DataError),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl EngineError {
    /// The payload a caller receives for this error
    pub fn error_data(&self) -> ErrorData {
        match self {
            EngineError::NotRegistered(key) => ErrorData::trigger_not_found(&format!(
                "any automation of release {}",
                key
            )),
            EngineError::AutomationNotFound(alias) => {
                ErrorData::new(
                    codes::TRIGGER_NOT_FOUND,
                    "No matching automation",
                    format!("Automation '{}' is not configured.", alias),
                    404,
                )
                .with_detail(format!("Automation alias: {}", alias))
            }
            EngineError::Config(err) => err.to_error_data(),
            EngineError::Automation(err) => err.error_data(),
            EngineError::Snapshot(err) => err.to_error_data(),
            other => ErrorData::engine_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::DeploymentEnvironment;

    #[test]
    fn test_not_registered_is_not_found() {
        let key = ReleaseKey::new("acme", "motor", DeploymentEnvironment::Production);
        let err = EngineError::NotRegistered(key);
        let payload = err.error_data();
        assert_eq!(payload.code, codes::TRIGGER_NOT_FOUND);
        assert_eq!(payload.http_status_code, 404);
        assert!(err.to_string().contains("acme/motor/production"));
    }

    #[test]
    fn test_automation_error_keeps_payload() {
        let err = EngineError::from(AutomationError::Cancelled);
        assert_eq!(err.error_data().code, codes::CANCELLED);
    }
}
