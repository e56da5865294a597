//! Boolean conditions
//!
//! Conditions are providers that resolve to a boolean. Logical combinators
//! short-circuit so operands after the deciding one are never resolved.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};
use crate::parse::{as_array, as_object, malformed, optional_bool, required_str, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

// ==================== Logical ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    /// Exactly one operand is true
    Xor,
}

#[derive(Debug, Clone)]
pub struct Logical {
    operator: LogicalOperator,
    operands: Vec<BoxedProvider>,
}

impl Logical {
    pub fn new(operator: LogicalOperator, operands: Vec<BoxedProvider>) -> Self {
        Self { operator, operands }
    }
}

#[async_trait]
impl Provider for Logical {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let result = match self.operator {
            LogicalOperator::And => {
                let mut all = true;
                for operand in &self.operands {
                    if !ctx.resolve_bool(operand.as_ref()).await? {
                        all = false;
                        break;
                    }
                }
                all
            }
            LogicalOperator::Or => {
                let mut any = false;
                for operand in &self.operands {
                    if ctx.resolve_bool(operand.as_ref()).await? {
                        any = true;
                        break;
                    }
                }
                any
            }
            LogicalOperator::Xor => {
                let mut seen = 0;
                for operand in &self.operands {
                    if ctx.resolve_bool(operand.as_ref()).await? {
                        seen += 1;
                        if seen > 1 {
                            break;
                        }
                    }
                }
                seen == 1
            }
        };
        Ok(Value::Bool(result))
    }
}

#[derive(Debug, Clone)]
pub struct Not {
    operand: BoxedProvider,
}

impl Not {
    pub fn new(operand: BoxedProvider) -> Self {
        Self { operand }
    }
}

#[async_trait]
impl Provider for Not {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        Ok(Value::Bool(!ctx.resolve_bool(self.operand.as_ref()).await?))
    }
}

/// Parse the operand list of `and`, `or` and `xor`
pub fn parse_operands(body: &Value, node_kind: &str) -> BuildResult<Vec<ProviderBuilder>> {
    let items = as_array(body, node_kind)?;
    if items.is_empty() {
        return Err(malformed(
            node_kind,
            format!("A {} condition needs at least one operand.", node_kind),
        ));
    }
    items.iter().map(ProviderBuilder::parse).collect()
}

// ==================== Text ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOperator {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
}

impl TextOperator {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "textEquals" => TextOperator::Equals,
            "textStartsWith" => TextOperator::StartsWith,
            "textEndsWith" => TextOperator::EndsWith,
            "textContains" => TextOperator::Contains,
            _ => return None,
        })
    }

    fn apply(&self, text: &str, value: &str) -> bool {
        match self {
            TextOperator::Equals => text == value,
            TextOperator::StartsWith => text.starts_with(value),
            TextOperator::EndsWith => text.ends_with(value),
            TextOperator::Contains => text.contains(value),
        }
    }
}

/// Parsed `{text, value, ignoreCase?}` body of a text condition
#[derive(Debug, Clone)]
pub struct TextConditionBuilder {
    pub operator: TextOperator,
    pub text: Box<ProviderBuilder>,
    pub value: Box<ProviderBuilder>,
    pub ignore_case: bool,
}

impl TextConditionBuilder {
    pub fn parse(operator: TextOperator, body: &Value) -> BuildResult<Self> {
        const KIND: &str = "text condition";
        let object = as_object(body, KIND)?;
        Ok(Self {
            operator,
            text: Box::new(ProviderBuilder::parse_required(object, "text", KIND)?),
            value: Box::new(ProviderBuilder::parse_required(object, "value", KIND)?),
            ignore_case: optional_bool(object, "ignoreCase", false, KIND)?,
        })
    }
}

/// Compares two texts; a `null` text never matches
#[derive(Debug, Clone)]
pub struct TextCondition {
    pub(crate) operator: TextOperator,
    pub(crate) text: BoxedProvider,
    pub(crate) value: BoxedProvider,
    pub(crate) ignore_case: bool,
}

#[async_trait]
impl Provider for TextCondition {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let text = ctx.resolve_optional_text(self.text.as_ref()).await?;
        let value = ctx.resolve_optional_text(self.value.as_ref()).await?;
        let result = match (text, value) {
            (Some(text), Some(value)) if self.ignore_case => self
                .operator
                .apply(&text.to_lowercase(), &value.to_lowercase()),
            (Some(text), Some(value)) => self.operator.apply(&text, &value),
            (None, None) => self.operator == TextOperator::Equals,
            _ => false,
        };
        Ok(Value::Bool(result))
    }
}

/// Parsed `textMatchesRegex`; the pattern is compiled once here
#[derive(Debug, Clone)]
pub struct RegexConditionBuilder {
    pub text: Box<ProviderBuilder>,
    pub regex: Regex,
}

impl RegexConditionBuilder {
    pub fn parse(body: &Value) -> BuildResult<Self> {
        const KIND: &str = "textMatchesRegex condition";
        let object = as_object(body, KIND)?;
        let pattern = required_str(object, "regex", KIND)?;
        let regex = Regex::new(pattern)
            .map_err(|e| malformed(KIND, format!("Invalid regular expression: {}", e)))?;
        Ok(Self {
            text: Box::new(ProviderBuilder::parse_required(object, "text", KIND)?),
            regex,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegexCondition {
    pub(crate) text: BoxedProvider,
    pub(crate) regex: Regex,
}

#[async_trait]
impl Provider for RegexCondition {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let matched = match ctx.resolve_optional_text(self.text.as_ref()).await? {
            Some(text) => self.regex.is_match(&text),
            None => false,
        };
        Ok(Value::Bool(matched))
    }
}

// ==================== Values ====================

/// True when the list holds an item equal to the value
#[derive(Debug, Clone)]
pub struct ListContains {
    list: BoxedProvider,
    value: BoxedProvider,
}

impl ListContains {
    pub fn new(list: BoxedProvider, value: BoxedProvider) -> Self {
        Self { list, value }
    }
}

#[async_trait]
impl Provider for ListContains {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let list = match ctx.resolve(self.list.as_ref()).await? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => return Err(ProviderError::invalid_type("list", "list", &other)),
        };
        let value = ctx.resolve(self.value.as_ref()).await?;
        Ok(Value::Bool(list.contains(&value)))
    }
}

#[derive(Debug, Clone)]
pub struct ValueIsNull {
    value: BoxedProvider,
}

impl ValueIsNull {
    pub fn new(value: BoxedProvider) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Provider for ValueIsNull {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        Ok(Value::Bool(ctx.resolve(self.value.as_ref()).await?.is_null()))
    }
}
