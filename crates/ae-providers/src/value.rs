//! Literal and structured values

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};

/// A literal value
#[derive(Debug, Clone)]
pub struct StaticValue(pub Value);

#[async_trait]
impl Provider for StaticValue {
    async fn resolve(&self, _ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        Ok(self.0.clone())
    }
}

/// A list whose items are resolved in order
#[derive(Debug, Clone)]
pub struct ListProvider {
    items: Vec<BoxedProvider>,
}

impl ListProvider {
    pub fn new(items: Vec<BoxedProvider>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl Provider for ListProvider {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            out.push(ctx.resolve(item.as_ref()).await?);
        }
        Ok(Value::Array(out))
    }
}

/// An object whose properties are resolved in declared order
#[derive(Debug, Clone)]
pub struct ObjectProvider {
    properties: Vec<(String, BoxedProvider)>,
}

impl ObjectProvider {
    pub fn new(properties: Vec<(String, BoxedProvider)>) -> Self {
        Self { properties }
    }
}

#[async_trait]
impl Provider for ObjectProvider {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let mut out = Map::new();
        for (name, provider) in &self.properties {
            let value = ctx
                .resolve(provider.as_ref())
                .await
                .map_err(|e| e.with_detail(format!("Property: {}", name)))?;
            out.insert(name.clone(), value);
        }
        Ok(Value::Object(out))
    }
}

/// Parses JSON text into a value
#[derive(Debug, Clone)]
pub struct ParseJson {
    text: BoxedProvider,
}

impl ParseJson {
    pub fn new(text: BoxedProvider) -> Self {
        Self { text }
    }
}

#[async_trait]
impl Provider for ParseJson {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let text = ctx.resolve_text(self.text.as_ref()).await?;
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidType(
                ae_core::ErrorData::invalid_type("text", "JSON", "text")
                    .with_detail(format!("Parse error: {}", e)),
            )
        })
    }
}

/// Serializes a value to JSON text
#[derive(Debug, Clone)]
pub struct JsonText {
    value: BoxedProvider,
}

impl JsonText {
    pub fn new(value: BoxedProvider) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Provider for JsonText {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let value = ctx.resolve(self.value.as_ref()).await?;
        Ok(Value::String(value.to_string()))
    }
}

/// Number of items in a list; `null` counts as empty
#[derive(Debug, Clone)]
pub struct CountListItems {
    list: BoxedProvider,
}

impl CountListItems {
    pub fn new(list: BoxedProvider) -> Self {
        Self { list }
    }
}

#[async_trait]
impl Provider for CountListItems {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        match ctx.resolve(self.list.as_ref()).await? {
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Null => Ok(Value::from(0)),
            other => Err(ProviderError::invalid_type("value", "list", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_data;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn literal(value: Value) -> BoxedProvider {
        Arc::new(StaticValue(value))
    }

    #[tokio::test]
    async fn test_object_keeps_declared_order() {
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let object = ObjectProvider::new(vec![
            ("z".into(), literal(Value::from(1))),
            ("a".into(), literal(Value::from(2))),
        ]);
        let value = ctx.resolve(&object).await.unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_parse_json_and_count() {
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());

        let parsed = ParseJson::new(literal(Value::from("[1, 2, 3]")));
        let count = CountListItems::new(Arc::new(parsed));
        assert_eq!(ctx.resolve(&count).await.unwrap(), Value::from(3));

        let bad = ParseJson::new(literal(Value::from("{oops")));
        let err = ctx.resolve(&bad).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidType(_)));
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_resolution() {
        let mut data = sample_data();
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = ProviderContext::new(&mut data, token);
        let err = ctx.resolve(&StaticValue(Value::Null)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.error_data().code, ae_core::codes::CANCELLED);
    }
}
