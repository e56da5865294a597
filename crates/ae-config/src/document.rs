//! Top-level automation document checks

use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Major schema version this engine understands
pub const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

/// `major.minor.patch` schema version declared by a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for SchemaVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || ConfigError::UnsupportedSchemaVersion {
            version: s.to_string(),
        };
        let mut parts = s.trim().split('.').map(|p| p.parse::<u32>());
        let major = parts.next().ok_or_else(unsupported)?.map_err(|_| unsupported())?;
        let minor = parts.next().transpose().map_err(|_| unsupported())?.unwrap_or(0);
        let patch = parts.next().transpose().map_err(|_| unsupported())?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(unsupported());
        }
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A loaded document whose envelope has been checked
///
/// The automation entries are left as JSON; building them into runtime
/// automations is the job of the automation crate.
#[derive(Debug, Clone)]
pub struct AutomationDocument {
    pub schema_version: SchemaVersion,
    pub automations: Vec<Value>,
}

impl AutomationDocument {
    /// Check the envelope of a loaded document
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        let Value::Object(mut root) = value else {
            return Err(ConfigError::InvalidValue {
                key: "<root>".to_string(),
                reason: "an automation document must be a JSON object".to_string(),
            });
        };

        let schema_version = match root.get("schemaVersion") {
            Some(Value::String(s)) => s.parse::<SchemaVersion>()?,
            Some(Value::Number(n)) => n.to_string().parse::<SchemaVersion>()?,
            Some(other) => {
                return Err(ConfigError::UnsupportedSchemaVersion {
                    version: other.to_string(),
                })
            }
            None => {
                return Err(ConfigError::MissingProperty {
                    property: "schemaVersion".to_string(),
                })
            }
        };
        if schema_version.major != SUPPORTED_SCHEMA_MAJOR {
            return Err(ConfigError::UnsupportedSchemaVersion {
                version: schema_version.to_string(),
            });
        }

        let automations = match root.remove("automations") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "automations".to_string(),
                    reason: "must be an array".to_string(),
                })
            }
            None => {
                return Err(ConfigError::MissingProperty {
                    property: "automations".to_string(),
                })
            }
        };

        Ok(Self {
            schema_version,
            automations,
        })
    }
}
