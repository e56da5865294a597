//! Tenant context identifying who an invocation runs for

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Deployment environment of a product release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl DeploymentEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentEnvironment::Development => "development",
            DeploymentEnvironment::Staging => "staging",
            DeploymentEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(DeploymentEnvironment::Development),
            "staging" => Ok(DeploymentEnvironment::Staging),
            "production" => Ok(DeploymentEnvironment::Production),
            other => Err(format!("unknown deployment environment '{}'", other)),
        }
    }
}

/// Context for tracking the tenant an invocation runs for and its causality
///
/// Every trigger invocation, event and background job carries a context so
/// that work started from it can be traced back to its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    /// Unique identifier for this context (ULID)
    pub id: String,

    pub tenant_id: String,

    pub product_id: String,

    pub environment: DeploymentEnvironment,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<String>,

    /// Parent context ID for tracking causality chains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl TenantContext {
    /// Create a new context with a fresh ULID
    pub fn new(
        tenant_id: impl Into<String>,
        product_id: impl Into<String>,
        environment: DeploymentEnvironment,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            tenant_id: tenant_id.into(),
            product_id: product_id.into(),
            environment,
            organisation_id: None,
            parent_id: None,
        }
    }

    /// Set the organisation
    pub fn with_organisation(mut self, organisation_id: impl Into<String>) -> Self {
        self.organisation_id = Some(organisation_id.into());
        self
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_keeps_tenant() {
        let parent = TenantContext::new("acme", "motor", DeploymentEnvironment::Staging)
            .with_organisation("brokers");
        let child = parent.child();

        assert_ne!(child.id, parent.id);
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(child.tenant_id, "acme");
        assert_eq!(child.organisation_id.as_deref(), Some("brokers"));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(
            "Production".parse::<DeploymentEnvironment>().unwrap(),
            DeploymentEnvironment::Production
        );
        assert!("qa".parse::<DeploymentEnvironment>().is_err());
    }
}
