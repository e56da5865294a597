//! Path lookups against the execution context or a resolved data object

use ae_core::pointer::{self, PathOutcome};
use ae_core::ErrorData;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::trace;

use crate::error::{kind_name, ProviderError, ProviderResult};
use crate::parse::{as_object, optional_bool, required_str, BuildResult};
use crate::provider::{BoxedProvider, Provider, ProviderContext};
use crate::ProviderBuilder;

/// Type a typed lookup insists on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Text,
    Integer,
    Number,
    Condition,
    List,
    Object,
    Date,
    Time,
    DateTime,
}

impl ExpectedType {
    /// Map a typed lookup key such as `objectPathLookupText`
    pub fn from_key(key: &str) -> Option<Self> {
        let suffix = key.strip_prefix("objectPathLookup")?;
        Some(match suffix {
            "Text" => ExpectedType::Text,
            "Integer" => ExpectedType::Integer,
            "Number" => ExpectedType::Number,
            "Condition" => ExpectedType::Condition,
            "List" => ExpectedType::List,
            "Object" => ExpectedType::Object,
            "Date" => ExpectedType::Date,
            "Time" => ExpectedType::Time,
            "DateTime" => ExpectedType::DateTime,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExpectedType::Text => "text",
            ExpectedType::Integer => "integer",
            ExpectedType::Number => "number",
            ExpectedType::Condition => "condition",
            ExpectedType::List => "list",
            ExpectedType::Object => "object",
            ExpectedType::Date => "date",
            ExpectedType::Time => "time",
            ExpectedType::DateTime => "dateTime",
        }
    }

    /// Whether a non-null value has this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ExpectedType::Text, Value::String(_)) => true,
            (ExpectedType::Integer, v) => crate::provider::as_i64(v).is_some(),
            (ExpectedType::Number, Value::Number(_)) => true,
            (ExpectedType::Condition, Value::Bool(_)) => true,
            (ExpectedType::List, Value::Array(_)) => true,
            (ExpectedType::Object, Value::Object(_)) => true,
            (ExpectedType::Date, Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            (ExpectedType::Time, Value::String(s)) => crate::comparison::parse_time(s).is_some(),
            (ExpectedType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
            _ => false,
        }
    }
}

/// Parsed `objectPathLookup*` configuration
#[derive(Debug, Clone)]
pub struct PathLookupBuilder {
    pub path: String,
    pub data_object: Option<Box<ProviderBuilder>>,
    pub value_if_not_found: Option<Box<ProviderBuilder>>,
    pub value_if_null: Option<Box<ProviderBuilder>>,
    pub default_value: Option<Box<ProviderBuilder>>,
    pub raise_error_if_not_found: bool,
    pub raise_error_if_null: bool,
    pub expected: Option<ExpectedType>,
}

impl PathLookupBuilder {
    /// Accepts a bare path string or the full object form
    pub fn parse(body: &Value, expected: Option<ExpectedType>) -> BuildResult<Self> {
        const KIND: &str = "path lookup";
        if let Value::String(path) = body {
            return Ok(Self {
                path: path.clone(),
                data_object: None,
                value_if_not_found: None,
                value_if_null: None,
                default_value: None,
                raise_error_if_not_found: true,
                raise_error_if_null: false,
                expected,
            });
        }

        let object = as_object(body, KIND)?;
        Ok(Self {
            path: required_str(object, "path", KIND)?.to_string(),
            data_object: ProviderBuilder::parse_optional(object, "dataObject")?.map(Box::new),
            value_if_not_found: ProviderBuilder::parse_optional(object, "valueIfNotFound")?
                .map(Box::new),
            value_if_null: ProviderBuilder::parse_optional(object, "valueIfNull")?.map(Box::new),
            default_value: ProviderBuilder::parse_optional(object, "defaultValue")?.map(Box::new),
            raise_error_if_not_found: optional_bool(object, "raiseErrorIfNotFound", true, KIND)?,
            raise_error_if_null: optional_bool(object, "raiseErrorIfNull", false, KIND)?,
            expected,
        })
    }
}

/// Looks up a path, applying the configured fallbacks
///
/// `valueIfNotFound` runs only when nothing exists at the path and
/// `valueIfNull` only when an explicit `null` does; `defaultValue` covers
/// both. A null intermediate with segments left to walk is always an error.
#[derive(Debug, Clone)]
pub struct PathLookup {
    pub(crate) path: String,
    pub(crate) data_object: Option<BoxedProvider>,
    pub(crate) value_if_not_found: Option<BoxedProvider>,
    pub(crate) value_if_null: Option<BoxedProvider>,
    pub(crate) default_value: Option<BoxedProvider>,
    pub(crate) raise_error_if_not_found: bool,
    pub(crate) raise_error_if_null: bool,
    pub(crate) expected: Option<ExpectedType>,
}

impl PathLookup {
    /// A plain lookup that errors when nothing is found
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data_object: None,
            value_if_not_found: None,
            value_if_null: None,
            default_value: None,
            raise_error_if_not_found: true,
            raise_error_if_null: false,
            expected: None,
        }
    }

    pub fn with_value_if_not_found(mut self, provider: BoxedProvider) -> Self {
        self.value_if_not_found = Some(provider);
        self
    }

    pub fn with_value_if_null(mut self, provider: BoxedProvider) -> Self {
        self.value_if_null = Some(provider);
        self
    }

    pub fn with_expected(mut self, expected: ExpectedType) -> Self {
        self.expected = Some(expected);
        self
    }

    async fn fallback(
        &self,
        ctx: &mut ProviderContext<'_>,
        specific: Option<&BoxedProvider>,
    ) -> ProviderResult<Option<Value>> {
        match specific.or(self.default_value.as_ref()) {
            Some(provider) => Ok(Some(ctx.resolve(provider.as_ref()).await?)),
            None => Ok(None),
        }
    }

    fn check_type(&self, value: Value) -> ProviderResult<Value> {
        match self.expected {
            Some(expected) if !expected.accepts(&value) => Err(ProviderError::InvalidType(
                ErrorData::invalid_type(&self.path, expected.name(), kind_name(&value))
                    .with_detail(format!("Path: {}", self.path)),
            )),
            _ => Ok(value),
        }
    }
}

#[async_trait]
impl Provider for PathLookup {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let outcome = lookup_outcome(ctx, &self.path, self.data_object.as_ref()).await?;
        trace!(path = %self.path, found = outcome.exists(), "Resolved path lookup");

        match outcome {
            PathOutcome::Found(value) => self.check_type(value.into_owned()),
            PathOutcome::Null => {
                if let Some(value) = self.fallback(ctx, self.value_if_null.as_ref()).await? {
                    return Ok(value);
                }
                if self.raise_error_if_null {
                    return Err(ProviderError::PathNotFound(
                        ErrorData::path_not_found(&self.path)
                            .with_detail("The value at the path is null."),
                    ));
                }
                Ok(Value::Null)
            }
            PathOutcome::NotFound => {
                if let Some(value) = self.fallback(ctx, self.value_if_not_found.as_ref()).await? {
                    return Ok(value);
                }
                if self.raise_error_if_not_found {
                    return Err(ProviderError::PathNotFound(ErrorData::path_not_found(
                        &self.path,
                    )));
                }
                Ok(Value::Null)
            }
        }
    }
}

/// Parsed `pathExists` configuration
#[derive(Debug, Clone)]
pub struct PathExistsBuilder {
    pub path: String,
    pub data_object: Option<Box<ProviderBuilder>>,
}

impl PathExistsBuilder {
    pub fn parse(body: &Value) -> BuildResult<Self> {
        const KIND: &str = "pathExists condition";
        if let Value::String(path) = body {
            return Ok(Self {
                path: path.clone(),
                data_object: None,
            });
        }
        let object = as_object(body, KIND)?;
        Ok(Self {
            path: required_str(object, "path", KIND)?.to_string(),
            data_object: ProviderBuilder::parse_optional(object, "dataObject")?.map(Box::new),
        })
    }
}

/// True when something, including an explicit `null`, exists at the path
#[derive(Debug, Clone)]
pub struct PathExists {
    pub(crate) path: String,
    pub(crate) data_object: Option<BoxedProvider>,
}

#[async_trait]
impl Provider for PathExists {
    async fn resolve(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<Value> {
        let outcome = lookup_outcome(ctx, &self.path, self.data_object.as_ref()).await?;
        Ok(Value::Bool(outcome.exists()))
    }
}

async fn lookup_outcome(
    ctx: &mut ProviderContext<'_>,
    path: &str,
    data_object: Option<&BoxedProvider>,
) -> ProviderResult<PathOutcome<'static>> {
    let context = ctx.path_context.clone();
    match data_object {
        Some(provider) => {
            let root = ctx.resolve(provider.as_ref()).await?;
            let outcome = pointer::lookup_with_context(&root, path, context.as_deref())
                .map_err(|e| ProviderError::PathResolution(e.to_error_data()))?;
            Ok(outcome.into_owned())
        }
        None => Ok(ctx.data.lookup(path, context.as_deref())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_data;
    use crate::value::StaticValue;
    use ae_core::codes;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn literal(value: Value) -> BoxedProvider {
        Arc::new(StaticValue(value))
    }

    async fn run(provider: &dyn Provider) -> ProviderResult<Value> {
        let mut data = sample_data();
        data.set_variable("nothing", Value::Null).unwrap();
        data.set_variable("items", json!([{"id": "a"}, {"id": "b"}]))
            .unwrap();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        ctx.resolve(provider).await
    }

    // ==================== Outcomes ====================

    #[tokio::test]
    async fn test_found_value() {
        let value = run(&PathLookup::new("/variables/items/1/id")).await.unwrap();
        assert_eq!(value, json!("b"));
    }

    #[tokio::test]
    async fn test_not_found_raises_by_default() {
        let err = run(&PathLookup::new("/variables/missing")).await.unwrap_err();
        assert!(matches!(err, ProviderError::PathNotFound(_)));
        let data = err.error_data();
        assert_eq!(data.code, codes::PATH_NOT_FOUND);
        assert!(data
            .additional_details
            .contains(&"Path: /variables/missing".to_string()));
    }

    #[tokio::test]
    async fn test_found_null_is_not_an_error() {
        let value = run(&PathLookup::new("/variables/nothing")).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_null_intermediate_is_error() {
        let err = run(&PathLookup::new("/variables/nothing/deeper"))
            .await
            .unwrap_err();
        assert_eq!(err.error_data().code, codes::PATH_RESOLUTION_ERROR);

        let exists = PathExists {
            path: "/variables/nothing/deeper".into(),
            data_object: None,
        };
        assert!(run(&exists).await.is_err());
    }

    // ==================== Fallbacks ====================

    #[tokio::test]
    async fn test_value_if_not_found_ignores_null() {
        let lookup = PathLookup::new("/variables/nothing")
            .with_value_if_not_found(literal(json!("fallback")));
        assert_eq!(run(&lookup).await.unwrap(), Value::Null);

        let lookup = PathLookup::new("/variables/missing")
            .with_value_if_not_found(literal(json!("fallback")));
        assert_eq!(run(&lookup).await.unwrap(), json!("fallback"));
    }

    #[tokio::test]
    async fn test_value_if_null_ignores_not_found() {
        let lookup =
            PathLookup::new("/variables/nothing").with_value_if_null(literal(json!("was null")));
        assert_eq!(run(&lookup).await.unwrap(), json!("was null"));

        let lookup =
            PathLookup::new("/variables/missing").with_value_if_null(literal(json!("was null")));
        assert!(run(&lookup).await.is_err());
    }

    #[tokio::test]
    async fn test_default_value_covers_both() {
        let builder = PathLookupBuilder::parse(
            &json!({"path": "/variables/missing", "defaultValue": 7}),
            None,
        )
        .unwrap();
        let provider = ProviderBuilder::PathLookup(builder).build(&Default::default());
        assert_eq!(run(provider.as_ref()).await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_raise_error_if_not_found_false() {
        let builder = PathLookupBuilder::parse(
            &json!({"path": "/variables/missing", "raiseErrorIfNotFound": false}),
            None,
        )
        .unwrap();
        let provider = ProviderBuilder::PathLookup(builder).build(&Default::default());
        assert_eq!(run(provider.as_ref()).await.unwrap(), Value::Null);
    }

    // ==================== Typed lookups ====================

    #[tokio::test]
    async fn test_typed_lookup_rejects_wrong_type() {
        let lookup = PathLookup::new("/variables/items").with_expected(ExpectedType::Text);
        let err = run(&lookup).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidType(_)));
        assert!(err
            .error_data()
            .additional_details
            .contains(&"Actual type: list".to_string()));

        let lookup = PathLookup::new("/variables/items").with_expected(ExpectedType::List);
        assert!(run(&lookup).await.is_ok());
    }

    #[test]
    fn test_expected_type_from_key() {
        assert_eq!(
            ExpectedType::from_key("objectPathLookupDateTime"),
            Some(ExpectedType::DateTime)
        );
        assert_eq!(ExpectedType::from_key("objectPathLookup"), None);
        assert!(ExpectedType::Integer.accepts(&json!(3.0)));
        assert!(!ExpectedType::Integer.accepts(&json!(3.5)));
        assert!(ExpectedType::Date.accepts(&json!("2026-01-31")));
        assert!(!ExpectedType::Date.accepts(&json!("2026-01-31T00:00:00Z")));
    }

    // ==================== Relative paths and data objects ====================

    #[tokio::test]
    async fn test_relative_path_uses_context() {
        let mut data = sample_data();
        data.set_variable("items", json!([{"id": "a"}, {"id": "b"}]))
            .unwrap();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new())
            .with_path_context("/variables/items/1");

        let index = ctx.resolve(&PathLookup::new("0#")).await.unwrap();
        assert_eq!(index, json!(1));
        let sibling = ctx.resolve(&PathLookup::new("1/0/id")).await.unwrap();
        assert_eq!(sibling, json!("a"));
    }

    #[tokio::test]
    async fn test_data_object_lookup() {
        let lookup = PathLookup {
            data_object: Some(literal(json!({"nested": {"x": 1}}))),
            ..PathLookup::new("/nested/x")
        };
        assert_eq!(run(&lookup).await.unwrap(), json!(1));

        let exists = PathExists {
            path: "/nested/y".into(),
            data_object: Some(literal(json!({"nested": {"y": null}}))),
        };
        assert_eq!(run(&exists).await.unwrap(), json!(true));
    }
}
