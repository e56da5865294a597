//! Computed expressions

use std::sync::Arc;

use ae_template::TemplateEngine;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::parse::{as_object, required_str, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

/// Parsed `expression` configuration
#[derive(Debug, Clone)]
pub struct ExpressionBuilder {
    pub expression: String,
    pub data_object: Option<Box<ProviderBuilder>>,
}

impl ExpressionBuilder {
    pub fn parse(body: &Value) -> BuildResult<Self> {
        const KIND: &str = "expression";
        if let Value::String(expression) = body {
            return Ok(Self {
                expression: expression.clone(),
                data_object: None,
            });
        }
        let object = as_object(body, KIND)?;
        Ok(Self {
            expression: required_str(object, "expression", KIND)?.to_string(),
            data_object: ProviderBuilder::parse_optional(object, "dataObject")?.map(Box::new),
        })
    }
}

/// Evaluates a minijinja expression, e.g.
/// `variables.total * 1.2 if variables.taxable else variables.total`
pub struct Expression {
    templates: Arc<TemplateEngine>,
    expression: String,
    data_object: Option<BoxedProvider>,
}

impl Expression {
    pub fn new(
        templates: Arc<TemplateEngine>,
        expression: impl Into<String>,
        data_object: Option<BoxedProvider>,
    ) -> Self {
        Self {
            templates,
            expression: expression.into(),
            data_object,
        }
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expression")
            .field("expression", &self.expression)
            .finish()
    }
}

#[async_trait]
impl Provider for Expression {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let root = ctx.data_object(self.data_object.as_ref()).await?;
        self.templates
            .evaluate_json(&self.expression, &root)
            .map_err(|e| {
                debug!(expression = %self.expression, error = %e, "Expression failed");
                ProviderError::expression(e.to_string(), &self.expression)
            })
    }
}
