//! Error types for document loading

use ae_core::{codes, ErrorData};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading an automation document
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to parse JSON
    #[error("failed to parse JSON in {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Secret not found
    #[error("secret '{key}' not found in secrets.yaml")]
    SecretNotFound { key: String },

    /// Invalid include path
    #[error("invalid include path '{path}': {reason}")]
    InvalidIncludePath { path: String, reason: String },

    /// Directory not found for include_dir_*
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Circular include detected
    #[error("circular include detected: {path}")]
    CircularInclude { path: PathBuf },

    /// Environment variable not found
    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// A required top-level property is missing
    #[error("missing required property '{property}'")]
    MissingProperty { property: String },

    /// The document declares a schema version this engine cannot run
    #[error("unsupported schema version '{version}'")]
    UnsupportedSchemaVersion { version: String },
}

impl ConfigError {
    /// Convert to the structured payload surfaced to callers
    pub fn to_error_data(&self) -> ErrorData {
        let code = match self {
            ConfigError::MissingProperty { .. } => codes::MISSING_PROPERTY,
            ConfigError::UnsupportedSchemaVersion { .. } => codes::UNSUPPORTED_SCHEMA_VERSION,
            _ => codes::MALFORMED_CONFIGURATION,
        };
        let data = ErrorData::new(code, "Invalid configuration", self.to_string(), 400);
        match self {
            ConfigError::ReadFile { path, .. }
            | ConfigError::ParseYaml { path, .. }
            | ConfigError::ParseJson { path, .. } => {
                data.with_detail(format!("File: {}", path.display()))
            }
            ConfigError::MissingProperty { property } => {
                data.with_detail(format!("Property: {}", property))
            }
            _ => data,
        }
    }
}

impl From<ConfigError> for ErrorData {
    fn from(err: ConfigError) -> Self {
        err.to_error_data()
    }
}
