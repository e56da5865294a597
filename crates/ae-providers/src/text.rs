//! Text providers

use std::sync::Arc;

use ae_template::TemplateEngine;
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};
use crate::parse::{as_object, required_str, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

/// Parsed `templateText` configuration
#[derive(Debug, Clone)]
pub struct TemplateTextBuilder {
    pub template: String,
    pub data_object: Option<Box<ProviderBuilder>>,
}

impl TemplateTextBuilder {
    pub fn parse(body: &Value) -> BuildResult<Self> {
        const KIND: &str = "templateText";
        if let Value::String(template) = body {
            return Ok(Self {
                template: template.clone(),
                data_object: None,
            });
        }
        let object = as_object(body, KIND)?;
        Ok(Self {
            template: required_str(object, "template", KIND)?.to_string(),
            data_object: ProviderBuilder::parse_optional(object, "dataObject")?.map(Box::new),
        })
    }
}

/// Renders a minijinja template against the execution context
///
/// The template sees the context sections as top-level variables, e.g.
/// `{{ actions.getQuote.httpResponse.content.total }}`.
pub struct TemplateText {
    templates: Arc<TemplateEngine>,
    template: String,
    data_object: Option<BoxedProvider>,
}

impl TemplateText {
    pub fn new(
        templates: Arc<TemplateEngine>,
        template: impl Into<String>,
        data_object: Option<BoxedProvider>,
    ) -> Self {
        Self {
            templates,
            template: template.into(),
            data_object,
        }
    }
}

impl std::fmt::Debug for TemplateText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateText")
            .field("template", &self.template)
            .finish()
    }
}

#[async_trait]
impl Provider for TemplateText {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        if !TemplateEngine::is_template(&self.template) {
            return Ok(Value::String(self.template.clone()));
        }
        let root = ctx.data_object(self.data_object.as_ref()).await?;
        self.templates
            .render_with_context(&self.template, &root)
            .map(Value::String)
            .map_err(|e| ProviderError::template(e, &self.template))
    }
}

/// Joins resolved text parts; `null` parts are skipped
#[derive(Debug, Clone)]
pub struct ConcatenatedText {
    parts: Vec<BoxedProvider>,
    separator: String,
}

impl ConcatenatedText {
    pub fn new(parts: Vec<BoxedProvider>, separator: impl Into<String>) -> Self {
        Self {
            parts,
            separator: separator.into(),
        }
    }
}

#[async_trait]
impl Provider for ConcatenatedText {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let mut pieces = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            if let Some(text) = ctx.resolve_optional_text(part.as_ref()).await? {
                pieces.push(text);
            }
        }
        Ok(Value::String(pieces.join(&self.separator)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCase {
    Upper,
    Lower,
}

/// Changes the case of resolved text
#[derive(Debug, Clone)]
pub struct ChangeCase {
    text: BoxedProvider,
    case: TextCase,
}

impl ChangeCase {
    pub fn new(text: BoxedProvider, case: TextCase) -> Self {
        Self { text, case }
    }
}

#[async_trait]
impl Provider for ChangeCase {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let text = match ctx.resolve_optional_text(self.text.as_ref()).await? {
            Some(text) => text,
            None => return Ok(Value::Null),
        };
        Ok(Value::String(match self.case {
            TextCase::Upper => text.to_uppercase(),
            TextCase::Lower => text.to_lowercase(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_data;
    use crate::value::StaticValue;
    use ae_core::codes;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn literal(value: Value) -> BoxedProvider {
        Arc::new(StaticValue(value))
    }

    #[tokio::test]
    async fn test_template_reads_context_sections() {
        let mut data = sample_data();
        data.set_variable("customer", json!({"name": "Ada"})).unwrap();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());

        let template = TemplateText::new(
            Arc::new(TemplateEngine::new()),
            "Hello {{ variables.customer.name }} via {{ trigger.httpRequest.httpVerb }}",
            None,
        );
        let value = ctx.resolve(&template).await.unwrap();
        assert_eq!(value, json!("Hello Ada via POST"));
    }

    #[tokio::test]
    async fn test_template_with_data_object() {
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let template = TemplateText::new(
            Arc::new(TemplateEngine::new()),
            "{{ a }}-{{ b }}",
            Some(literal(json!({"a": 1, "b": "x"}))),
        );
        assert_eq!(ctx.resolve(&template).await.unwrap(), json!("1-x"));
    }

    #[tokio::test]
    async fn test_template_syntax_error_payload() {
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let template = TemplateText::new(Arc::new(TemplateEngine::new()), "{{ broken ", None);
        let err = ctx.resolve(&template).await.unwrap_err();
        let payload = err.error_data();
        assert_eq!(payload.code, codes::TEMPLATE_FAILED);
        assert!(payload
            .additional_details
            .contains(&"Template: {{ broken ".to_string()));
    }

    #[tokio::test]
    async fn test_concatenate_and_case() {
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let joined = ConcatenatedText::new(
            vec![literal(json!("a")), literal(Value::Null), literal(json!(2))],
            "-",
        );
        assert_eq!(ctx.resolve(&joined).await.unwrap(), json!("a-2"));

        let upper = ChangeCase::new(Arc::new(joined), TextCase::Upper);
        assert_eq!(ctx.resolve(&upper).await.unwrap(), json!("A-2"));
    }
}
