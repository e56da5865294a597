//! Error conditions: a boolean condition paired with the error it raises

use ae_core::ErrorData;
use ae_providers::parse::{as_array, as_object, malformed, required, BuildResult};
use ae_providers::{BoxedProvider, Dependencies, ProviderBuilder, ProviderContext};
use serde_json::Value;

use crate::error::{ActionError, ActionResult};

/// Parse a configured `{code, title, message, httpStatusCode, additionalDetails?}`
pub fn parse_error_payload(value: &Value, node_kind: &str) -> BuildResult<ErrorData> {
    serde_json::from_value(value.clone()).map_err(|e| {
        malformed(node_kind, format!("Invalid error payload: {}", e)).with_detail("Property: error")
    })
}

/// Parsed `{condition, error}` pair
#[derive(Debug, Clone)]
pub struct ErrorConditionBuilder {
    pub condition: ProviderBuilder,
    pub error: ErrorData,
}

impl ErrorConditionBuilder {
    pub fn parse(value: &Value) -> BuildResult<Self> {
        const KIND: &str = "error condition";
        let object = as_object(value, KIND)?;
        Ok(Self {
            condition: ProviderBuilder::parse_required(object, "condition", KIND)?,
            error: parse_error_payload(required(object, "error", KIND)?, KIND)?,
        })
    }

    /// Parse an optional list of error conditions stored under `property`
    pub fn parse_list(
        object: &serde_json::Map<String, Value>,
        property: &str,
    ) -> BuildResult<Vec<Self>> {
        match object.get(property) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => as_array(value, property)?
                .iter()
                .map(ErrorConditionBuilder::parse)
                .collect(),
        }
    }

    pub fn build(&self, deps: &Dependencies) -> ErrorCondition {
        ErrorCondition {
            condition: self.condition.build(deps),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorCondition {
    pub condition: BoxedProvider,
    pub error: ErrorData,
}

/// Evaluate conditions in order; the first true one wins
///
/// Conditions after the first match are never resolved.
pub async fn first_match(
    conditions: &[ErrorCondition],
    ctx: &mut ProviderContext<'_>,
) -> ActionResult<Option<ErrorData>> {
    for condition in conditions {
        if ctx.resolve_bool(condition.condition.as_ref()).await? {
            return Ok(Some(condition.error.clone()));
        }
    }
    Ok(None)
}

/// Like [`first_match`], failing with the matched error
pub async fn check(conditions: &[ErrorCondition], ctx: &mut ProviderContext<'_>) -> ActionResult<()> {
    match first_match(conditions, ctx).await? {
        Some(error) => Err(ActionError::Raised(error)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;
    use ae_providers::testing::sample_data;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_parse_requires_payload_fields() {
        let err = ErrorConditionBuilder::parse(&json!({
            "condition": true,
            "error": {"code": "x"}
        }))
        .unwrap_err();
        assert_eq!(err.code, codes::MALFORMED_CONFIGURATION);

        let err = ErrorConditionBuilder::parse(&json!({"condition": true})).unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let deps = Dependencies::new();
        let conditions: Vec<ErrorCondition> = [
            json!({"condition": false, "error": {"code": "a", "title": "A", "message": "a", "httpStatusCode": 400}}),
            json!({"condition": true, "error": {"code": "b", "title": "B", "message": "b", "httpStatusCode": 409}}),
            json!({"condition": "not a boolean", "error": {"code": "c", "title": "C", "message": "c", "httpStatusCode": 400}}),
        ]
        .iter()
        .map(|c| ErrorConditionBuilder::parse(c).unwrap().build(&deps))
        .collect();

        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let matched = first_match(&conditions, &mut ctx).await.unwrap().unwrap();
        assert_eq!(matched.code, "b");
        assert_eq!(matched.http_status_code, 409);
    }
}
