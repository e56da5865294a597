//! Parsing provider configuration into builders, and building providers
//!
//! Any JSON scalar is a literal. A JSON array is a list whose items are
//! themselves providers. An object must carry exactly one of the keys in
//! [`PROVIDER_KEYS`].

use std::sync::Arc;

use ae_core::sole_discriminator;
use serde_json::{Map, Value};

use crate::comparison::{
    NumericCondition, NumericConditionBuilder, NumericKind, TemporalCondition,
    TemporalConditionBuilder, TemporalKind, TemporalOperator, TemporalOperatorBuilder,
};
use crate::condition::{
    parse_operands, ListContains, Logical, LogicalOperator, Not, RegexCondition,
    RegexConditionBuilder, TextCondition, TextConditionBuilder, TextOperator, ValueIsNull,
};
use crate::dependencies::Dependencies;
use crate::entity::{EntityObject, EntityObjectBuilder};
use crate::expression::{Expression, ExpressionBuilder};
use crate::parse::{as_array, as_object, malformed, optional_str, required, BuildResult};
use crate::path::{ExpectedType, PathExists, PathExistsBuilder, PathLookup, PathLookupBuilder};
use crate::provider::BoxedProvider;
use crate::text::{ChangeCase, ConcatenatedText, TemplateText, TemplateTextBuilder, TextCase};
use crate::time::{CurrentTime, TimeKind};
use crate::value::{CountListItems, JsonText, ListProvider, ObjectProvider, ParseJson, StaticValue};

/// Every discriminator key a provider object may carry
pub const PROVIDER_KEYS: &[&str] = &[
    "static",
    "object",
    "list",
    "parseJson",
    "countListItems",
    "objectPathLookup",
    "objectPathLookupText",
    "objectPathLookupInteger",
    "objectPathLookupNumber",
    "objectPathLookupCondition",
    "objectPathLookupList",
    "objectPathLookupObject",
    "objectPathLookupDate",
    "objectPathLookupTime",
    "objectPathLookupDateTime",
    "pathExists",
    "templateText",
    "concatenatedText",
    "jsonText",
    "textToUpperCase",
    "textToLowerCase",
    "expression",
    "currentDateTime",
    "currentDate",
    "currentTime",
    "entityObject",
    "and",
    "or",
    "xor",
    "not",
    "textEquals",
    "textStartsWith",
    "textEndsWith",
    "textContains",
    "textMatchesRegex",
    "integerCondition",
    "numberCondition",
    "dateCondition",
    "timeCondition",
    "dateTimeCondition",
    "listContains",
    "valueIsNull",
];

/// Configuration of one provider node, parsed but not yet built
#[derive(Debug, Clone)]
pub enum ProviderBuilder {
    Static(Value),
    List(Vec<ProviderBuilder>),
    Object(Vec<(String, ProviderBuilder)>),
    ParseJson(Box<ProviderBuilder>),
    CountListItems(Box<ProviderBuilder>),
    PathLookup(PathLookupBuilder),
    PathExists(PathExistsBuilder),
    TemplateText(TemplateTextBuilder),
    ConcatenatedText {
        parts: Vec<ProviderBuilder>,
        separator: String,
    },
    JsonText(Box<ProviderBuilder>),
    ChangeCase(Box<ProviderBuilder>, TextCase),
    Expression(ExpressionBuilder),
    CurrentTime(TimeKind),
    EntityObject(EntityObjectBuilder),
    Logical(LogicalOperator, Vec<ProviderBuilder>),
    Not(Box<ProviderBuilder>),
    TextCondition(TextConditionBuilder),
    RegexCondition(RegexConditionBuilder),
    NumericCondition(NumericConditionBuilder),
    TemporalCondition(TemporalConditionBuilder),
    ListContains {
        list: Box<ProviderBuilder>,
        value: Box<ProviderBuilder>,
    },
    ValueIsNull(Box<ProviderBuilder>),
}

impl ProviderBuilder {
    /// A literal that resolves to `value` unchanged
    pub fn literal(value: impl Into<Value>) -> Self {
        ProviderBuilder::Static(value.into())
    }

    pub fn parse(value: &Value) -> BuildResult<Self> {
        let object = match value {
            Value::Array(items) => {
                return items
                    .iter()
                    .map(ProviderBuilder::parse)
                    .collect::<BuildResult<Vec<_>>>()
                    .map(ProviderBuilder::List)
            }
            Value::Object(object) => object,
            scalar => return Ok(ProviderBuilder::Static(scalar.clone())),
        };

        let node = sole_discriminator(object, PROVIDER_KEYS, "provider")?;
        let body = node.body;
        let boxed = |v: &Value| ProviderBuilder::parse(v).map(Box::new);

        if let Some(expected) = ExpectedType::from_key(node.key) {
            return Ok(ProviderBuilder::PathLookup(PathLookupBuilder::parse(
                body,
                Some(expected),
            )?));
        }
        if let Some(operator) = TextOperator::from_key(node.key) {
            return Ok(ProviderBuilder::TextCondition(TextConditionBuilder::parse(
                operator, body,
            )?));
        }

        Ok(match node.key {
            "static" => ProviderBuilder::Static(body.clone()),
            "object" => ProviderBuilder::Object(
                as_object(body, "object")?
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), ProviderBuilder::parse(v)?)))
                    .collect::<BuildResult<_>>()?,
            ),
            "list" => ProviderBuilder::List(
                as_array(body, "list")?
                    .iter()
                    .map(ProviderBuilder::parse)
                    .collect::<BuildResult<_>>()?,
            ),
            "parseJson" => ProviderBuilder::ParseJson(boxed(body)?),
            "countListItems" => ProviderBuilder::CountListItems(boxed(body)?),
            "objectPathLookup" => {
                ProviderBuilder::PathLookup(PathLookupBuilder::parse(body, None)?)
            }
            "pathExists" => ProviderBuilder::PathExists(PathExistsBuilder::parse(body)?),
            "templateText" => ProviderBuilder::TemplateText(TemplateTextBuilder::parse(body)?),
            "concatenatedText" => parse_concatenated(body)?,
            "jsonText" => ProviderBuilder::JsonText(boxed(body)?),
            "textToUpperCase" => ProviderBuilder::ChangeCase(boxed(body)?, TextCase::Upper),
            "textToLowerCase" => ProviderBuilder::ChangeCase(boxed(body)?, TextCase::Lower),
            "expression" => ProviderBuilder::Expression(ExpressionBuilder::parse(body)?),
            "currentDateTime" => ProviderBuilder::CurrentTime(TimeKind::DateTime),
            "currentDate" => ProviderBuilder::CurrentTime(TimeKind::Date),
            "currentTime" => ProviderBuilder::CurrentTime(TimeKind::Time),
            "entityObject" => ProviderBuilder::EntityObject(EntityObjectBuilder::parse(body)?),
            "and" => ProviderBuilder::Logical(LogicalOperator::And, parse_operands(body, "and")?),
            "or" => ProviderBuilder::Logical(LogicalOperator::Or, parse_operands(body, "or")?),
            "xor" => ProviderBuilder::Logical(LogicalOperator::Xor, parse_operands(body, "xor")?),
            "not" => ProviderBuilder::Not(boxed(body)?),
            "textMatchesRegex" => {
                ProviderBuilder::RegexCondition(RegexConditionBuilder::parse(body)?)
            }
            "integerCondition" => ProviderBuilder::NumericCondition(
                NumericConditionBuilder::parse(NumericKind::Integer, body)?,
            ),
            "numberCondition" => ProviderBuilder::NumericCondition(
                NumericConditionBuilder::parse(NumericKind::Number, body)?,
            ),
            "dateCondition" => ProviderBuilder::TemporalCondition(
                TemporalConditionBuilder::parse(TemporalKind::Date, body)?,
            ),
            "timeCondition" => ProviderBuilder::TemporalCondition(
                TemporalConditionBuilder::parse(TemporalKind::Time, body)?,
            ),
            "dateTimeCondition" => ProviderBuilder::TemporalCondition(
                TemporalConditionBuilder::parse(TemporalKind::DateTime, body)?,
            ),
            "listContains" => {
                const KIND: &str = "listContains condition";
                let object = as_object(body, KIND)?;
                ProviderBuilder::ListContains {
                    list: Box::new(ProviderBuilder::parse_required(object, "list", KIND)?),
                    value: Box::new(ProviderBuilder::parse_required(object, "value", KIND)?),
                }
            }
            "valueIsNull" => ProviderBuilder::ValueIsNull(boxed(body)?),
            other => {
                return Err(malformed(
                    "provider",
                    format!("The provider \"{}\" is not supported.", other),
                ))
            }
        })
    }

    /// Parse `object[property]` when present and not `null`
    pub fn parse_optional(object: &Map<String, Value>, property: &str) -> BuildResult<Option<Self>> {
        match object.get(property) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => ProviderBuilder::parse(value)
                .map(Some)
                .map_err(|e| e.with_detail(format!("Property: {}", property))),
        }
    }

    /// Parse `object[property]`, which must be present; an explicit `null`
    /// is the null literal
    pub fn parse_required(
        object: &Map<String, Value>,
        property: &str,
        node_kind: &str,
    ) -> BuildResult<Self> {
        ProviderBuilder::parse(required(object, property, node_kind)?)
            .map_err(|e| e.with_detail(format!("Property: {}", property)))
    }

    /// Build the runtime provider
    pub fn build(&self, deps: &Dependencies) -> BoxedProvider {
        let build = |b: &ProviderBuilder| b.build(deps);
        let build_opt = |b: &Option<Box<ProviderBuilder>>| b.as_ref().map(|b| b.build(deps));

        match self {
            ProviderBuilder::Static(value) => Arc::new(StaticValue(value.clone())),
            ProviderBuilder::List(items) => {
                Arc::new(ListProvider::new(items.iter().map(build).collect()))
            }
            ProviderBuilder::Object(properties) => Arc::new(ObjectProvider::new(
                properties
                    .iter()
                    .map(|(name, b)| (name.clone(), build(b)))
                    .collect(),
            )),
            ProviderBuilder::ParseJson(b) => Arc::new(ParseJson::new(build(b))),
            ProviderBuilder::CountListItems(b) => Arc::new(CountListItems::new(build(b))),
            ProviderBuilder::PathLookup(b) => Arc::new(PathLookup {
                path: b.path.clone(),
                data_object: build_opt(&b.data_object),
                value_if_not_found: build_opt(&b.value_if_not_found),
                value_if_null: build_opt(&b.value_if_null),
                default_value: build_opt(&b.default_value),
                raise_error_if_not_found: b.raise_error_if_not_found,
                raise_error_if_null: b.raise_error_if_null,
                expected: b.expected,
            }),
            ProviderBuilder::PathExists(b) => Arc::new(PathExists {
                path: b.path.clone(),
                data_object: build_opt(&b.data_object),
            }),
            ProviderBuilder::TemplateText(b) => Arc::new(TemplateText::new(
                deps.templates.clone(),
                b.template.clone(),
                build_opt(&b.data_object),
            )),
            ProviderBuilder::ConcatenatedText { parts, separator } => Arc::new(
                ConcatenatedText::new(parts.iter().map(build).collect(), separator.clone()),
            ),
            ProviderBuilder::JsonText(b) => Arc::new(JsonText::new(build(b))),
            ProviderBuilder::ChangeCase(b, case) => Arc::new(ChangeCase::new(build(b), *case)),
            ProviderBuilder::Expression(b) => Arc::new(Expression::new(
                deps.templates.clone(),
                b.expression.clone(),
                build_opt(&b.data_object),
            )),
            ProviderBuilder::CurrentTime(kind) => {
                Arc::new(CurrentTime::new(deps.clock.clone(), *kind))
            }
            ProviderBuilder::EntityObject(b) => Arc::new(EntityObject::new(
                deps.entities.clone(),
                build(&b.entity_type),
                build(&b.entity_id),
            )),
            ProviderBuilder::Logical(operator, operands) => Arc::new(Logical::new(
                *operator,
                operands.iter().map(build).collect(),
            )),
            ProviderBuilder::Not(b) => Arc::new(Not::new(build(b))),
            ProviderBuilder::TextCondition(b) => Arc::new(TextCondition {
                operator: b.operator,
                text: build(&b.text),
                value: build(&b.value),
                ignore_case: b.ignore_case,
            }),
            ProviderBuilder::RegexCondition(b) => Arc::new(RegexCondition {
                text: build(&b.text),
                regex: b.regex.clone(),
            }),
            ProviderBuilder::NumericCondition(b) => Arc::new(NumericCondition {
                kind: b.kind,
                value: build(&b.value),
                operator: b.operator,
                operand: build(&b.operand),
            }),
            ProviderBuilder::TemporalCondition(b) => Arc::new(TemporalCondition {
                kind: b.kind,
                value: build(&b.value),
                operator: match &b.operator {
                    TemporalOperatorBuilder::Before(p) => TemporalOperator::Before(build(p)),
                    TemporalOperatorBuilder::After(p) => TemporalOperator::After(build(p)),
                    TemporalOperatorBuilder::EqualTo(p) => TemporalOperator::EqualTo(build(p)),
                    TemporalOperatorBuilder::BeforeOrEqualTo(p) => {
                        TemporalOperator::BeforeOrEqualTo(build(p))
                    }
                    TemporalOperatorBuilder::AfterOrEqualTo(p) => {
                        TemporalOperator::AfterOrEqualTo(build(p))
                    }
                    TemporalOperatorBuilder::InPeriod {
                        from,
                        to,
                        from_inclusive,
                        to_inclusive,
                    } => TemporalOperator::InPeriod {
                        from: build(from),
                        to: build(to),
                        from_inclusive: *from_inclusive,
                        to_inclusive: *to_inclusive,
                    },
                },
            }),
            ProviderBuilder::ListContains { list, value } => {
                Arc::new(ListContains::new(build(list), build(value)))
            }
            ProviderBuilder::ValueIsNull(b) => Arc::new(ValueIsNull::new(build(b))),
        }
    }
}

fn parse_concatenated(body: &Value) -> BuildResult<ProviderBuilder> {
    const KIND: &str = "concatenatedText";
    let (items, separator) = match body {
        Value::Array(items) => (items, String::new()),
        Value::Object(object) => (
            as_array(required(object, "items", KIND)?, KIND)?,
            optional_str(object, "separator", KIND)?
                .unwrap_or_default()
                .to_string(),
        ),
        _ => return Err(malformed(KIND, "A concatenatedText must be a list or an object.")),
    };
    Ok(ProviderBuilder::ConcatenatedText {
        parts: items
            .iter()
            .map(ProviderBuilder::parse)
            .collect::<BuildResult<_>>()?,
        separator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderContext;
    use crate::testing::{sample_data, FixedClock};
    use ae_core::codes;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    async fn resolve_with(config: Value, deps: &Dependencies) -> Value {
        let provider = ProviderBuilder::parse(&config).unwrap().build(deps);
        let mut data = sample_data();
        data.set_variable("firstName", json!("Ada")).unwrap();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        ctx.resolve(provider.as_ref()).await.unwrap()
    }

    async fn resolve(config: Value) -> Value {
        resolve_with(config, &Dependencies::new()).await
    }

    #[tokio::test]
    async fn test_literals() {
        assert_eq!(resolve(json!(3)).await, json!(3));
        assert_eq!(resolve(json!(null)).await, Value::Null);
        assert_eq!(resolve(json!("plain")).await, json!("plain"));
        assert_eq!(
            resolve(json!({"static": {"object": 1}})).await,
            json!({"object": 1})
        );
    }

    #[tokio::test]
    async fn test_nested_structures() {
        let config = json!({"object": {
            "name": {"objectPathLookupText": "/variables/firstName"},
            "tags": ["a", {"textToUpperCase": "b"}],
            "greeting": {"concatenatedText": {"items": ["hi", {"objectPathLookup": "/variables/firstName"}], "separator": " "}}
        }});
        assert_eq!(
            resolve(config).await,
            json!({"name": "Ada", "tags": ["a", "B"], "greeting": "hi Ada"})
        );
    }

    #[tokio::test]
    async fn test_clock_is_injected() {
        let deps = Dependencies::new().with_clock(Arc::new(FixedClock::at("2026-07-01T08:00:00Z")));
        assert_eq!(
            resolve_with(json!({"currentDate": {}}), &deps).await,
            json!("2026-07-01")
        );
    }

    #[tokio::test]
    async fn test_conditions_compose() {
        let config = json!({"and": [
            {"textStartsWith": {"text": {"objectPathLookup": "/variables/firstName"}, "value": "A"}},
            {"not": {"valueIsNull": {"objectPathLookup": "/variables/firstName"}}},
            {"pathExists": "/trigger/httpRequest"}
        ]});
        assert_eq!(resolve(config).await, json!(true));
    }

    // ==================== Errors ====================

    #[test]
    fn test_unknown_key_is_invalid_discriminator() {
        let err = ProviderBuilder::parse(&json!({"mystery": 1})).unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
    }

    #[test]
    fn test_two_keys_is_invalid_discriminator() {
        let err = ProviderBuilder::parse(&json!({"static": 1, "expression": "1"})).unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
    }

    #[test]
    fn test_misplaced_property_is_invalid_discriminator() {
        let err = ProviderBuilder::parse(&json!({
            "textEquals": {"text": "Alice", "value": "alice"},
            "ignorecase": true
        }))
        .unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
        assert!(err.message.contains("ignorecase"));
    }

    #[test]
    fn test_missing_property_names_the_property() {
        let err = ProviderBuilder::parse(&json!({"objectPathLookup": {"defaultValue": 1}}))
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);
        assert!(err.additional_details.contains(&"Property: path".to_string()));
    }

    #[test]
    fn test_empty_operand_list_rejected() {
        let err = ProviderBuilder::parse(&json!({"or": []})).unwrap_err();
        assert_eq!(err.code, codes::MALFORMED_CONFIGURATION);
    }
}
