//! The resolution protocol
//!
//! A provider is a compiled node that computes a value against the
//! execution context of one invocation. Providers hold no per-invocation
//! state, so one compiled graph serves any number of concurrent invocations.

use std::fmt;
use std::sync::Arc;

use ae_data::AutomationData;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ProviderResult};

/// A value computed against the execution context
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value>;
}

/// Shared handle to a compiled provider
pub type BoxedProvider = Arc<dyn Provider>;

/// Per-call resolution state
///
/// Carries the execution context explicitly; nothing is read from ambient
/// state.
pub struct ProviderContext<'a> {
    pub data: &'a mut AutomationData,

    pub cancellation: CancellationToken,

    /// Absolute pointer relative paths start from, e.g. the current item of
    /// an iteration
    pub path_context: Option<String>,
}

impl<'a> ProviderContext<'a> {
    pub fn new(data: &'a mut AutomationData, cancellation: CancellationToken) -> Self {
        Self {
            data,
            cancellation,
            path_context: None,
        }
    }

    pub fn with_path_context(mut self, path_context: impl Into<String>) -> Self {
        self.path_context = Some(path_context.into());
        self
    }

    /// Fail fast once the originating request is cancelled
    pub fn check_cancelled(&self) -> ProviderResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }

    /// Resolve a nested provider
    pub async fn resolve(&mut self, provider: &dyn Provider) -> ProviderResult<Value> {
        self.check_cancelled()?;
        provider.resolve(self).await
    }

    /// Resolve a provider expected to produce text
    ///
    /// Numbers and booleans are rendered as text.
    pub async fn resolve_text(&mut self, provider: &dyn Provider) -> ProviderResult<String> {
        match self.resolve(provider).await? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ProviderError::invalid_type("value", "text", &other)),
        }
    }

    /// Resolve a provider expected to produce text, keeping `null`
    pub async fn resolve_optional_text(
        &mut self,
        provider: &dyn Provider,
    ) -> ProviderResult<Option<String>> {
        match self.resolve(provider).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(ProviderError::invalid_type("value", "text", &other)),
        }
    }

    pub async fn resolve_bool(&mut self, provider: &dyn Provider) -> ProviderResult<bool> {
        match self.resolve(provider).await? {
            Value::Bool(b) => Ok(b),
            other => Err(ProviderError::invalid_type("value", "condition", &other)),
        }
    }

    pub async fn resolve_i64(&mut self, provider: &dyn Provider) -> ProviderResult<i64> {
        let value = self.resolve(provider).await?;
        as_i64(&value).ok_or_else(|| ProviderError::invalid_type("value", "integer", &value))
    }

    pub async fn resolve_f64(&mut self, provider: &dyn Provider) -> ProviderResult<f64> {
        let value = self.resolve(provider).await?;
        value
            .as_f64()
            .ok_or_else(|| ProviderError::invalid_type("value", "number", &value))
    }

    pub async fn resolve_list(&mut self, provider: &dyn Provider) -> ProviderResult<Vec<Value>> {
        match self.resolve(provider).await? {
            Value::Array(items) => Ok(items),
            other => Err(ProviderError::invalid_type("value", "list", &other)),
        }
    }

    /// The data object templates and expressions are evaluated against
    ///
    /// Uses the resolved `data_object` when configured, else the whole
    /// execution context.
    pub async fn data_object(&mut self, data_object: Option<&BoxedProvider>) -> ProviderResult<Value> {
        match data_object {
            Some(provider) => self.resolve(provider.as_ref()).await,
            None => Ok(self.data.to_value()?),
        }
    }
}

/// Integer view of a JSON number, accepting whole floats
pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

impl fmt::Debug for ProviderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("automation", &self.data.system.automation_alias)
            .field("path_context", &self.path_context)
            .finish()
    }
}
