//! Release identification

use ae_core::{DeploymentEnvironment, TenantContext};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the configuration a tenant's product runs in one environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseKey {
    pub tenant: String,
    pub product: String,
    pub environment: DeploymentEnvironment,
}

impl ReleaseKey {
    pub fn new(
        tenant: impl Into<String>,
        product: impl Into<String>,
        environment: DeploymentEnvironment,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            product: product.into(),
            environment,
        }
    }

    /// A fresh root context for an invocation of this release
    pub fn tenant_context(&self) -> TenantContext {
        TenantContext::new(&self.tenant, &self.product, self.environment)
    }
}

impl From<&TenantContext> for ReleaseKey {
    fn from(ctx: &TenantContext) -> Self {
        Self::new(&ctx.tenant_id, &ctx.product_id, ctx.environment)
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.product, self.environment)
    }
}
