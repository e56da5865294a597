//! Trigger definitions
//!
//! A trigger is selected by a single discriminator key:
//!
//! - `httpTrigger`: an inbound HTTP request to an endpoint path and verb
//! - `eventTrigger`: a domain event, optionally narrowed by custom event alias
//! - `periodicTrigger`: a recurrence fired by an external scheduler

use ae_core::sole_discriminator;
use ae_data::HttpResponseData;
use ae_providers::parse::{as_object, malformed, optional_str, required, required_str, BuildResult};
use ae_providers::{
    BoxedProvider, Dependencies, ProviderBuilder, ProviderContext, ProviderError, ProviderResult,
};
use ae_script::{ErrorCondition, ErrorConditionBuilder};
use croner::Cron;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::matcher::PathTemplate;

/// Discriminator keys of the trigger kinds
pub const TRIGGER_KEYS: &[&str] = &["httpTrigger", "eventTrigger", "periodicTrigger"];

// ==================== Builders ====================

/// Parsed trigger configuration
#[derive(Debug, Clone)]
pub struct TriggerBuilder {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<ProviderBuilder>,
    pub kind: TriggerKindBuilder,
}

#[derive(Debug, Clone)]
pub enum TriggerKindBuilder {
    Http {
        endpoint: EndpointBuilder,
        http_response: Option<HttpResponseBuilder>,
    },
    Event {
        event_type: String,
        custom_event_alias: Option<String>,
    },
    Periodic {
        recurrence: Recurrence,
        time_zone_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    pub path: String,
    pub http_verb: String,
    pub request_validation_errors: Vec<ErrorConditionBuilder>,
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponseBuilder {
    pub http_status_code: Option<ProviderBuilder>,
    pub headers: Vec<(String, ProviderBuilder)>,
    pub content_type: Option<ProviderBuilder>,
    pub content: Option<ProviderBuilder>,
}

impl TriggerBuilder {
    pub fn parse(value: &Value) -> BuildResult<Self> {
        let object = as_object(value, "trigger")?;
        let node = sole_discriminator(object, TRIGGER_KEYS, "trigger")?;
        let kind = node.key;
        let body = as_object(node.body, kind)?;

        let alias = required_str(body, "alias", kind)?.to_string();
        Self::parse_body(kind, body, alias.clone())
            .map_err(|e| e.with_detail(format!("Trigger alias: {}", alias)))
    }

    fn parse_body(kind: &str, body: &Map<String, Value>, alias: String) -> BuildResult<Self> {
        let kind_builder = match kind {
            "httpTrigger" => TriggerKindBuilder::Http {
                endpoint: EndpointBuilder::parse(required(body, "endpoint", kind)?)?,
                http_response: match body.get("httpResponse") {
                    None | Some(Value::Null) => None,
                    Some(response) => Some(HttpResponseBuilder::parse(response)?),
                },
            },
            "eventTrigger" => TriggerKindBuilder::Event {
                event_type: required_str(body, "eventType", kind)?.to_string(),
                custom_event_alias: optional_str(body, "customEventAlias", kind)?.map(str::to_string),
            },
            "periodicTrigger" => TriggerKindBuilder::Periodic {
                recurrence: Recurrence::parse(required(body, "recurrence", kind)?)?,
                time_zone_id: optional_str(body, "timeZoneId", kind)?.map(str::to_string),
            },
            other => {
                return Err(malformed(
                    "trigger",
                    format!("The trigger kind \"{}\" is not supported.", other),
                ))
            }
        };

        Ok(Self {
            name: required_str(body, "name", kind)?.to_string(),
            alias,
            description: optional_str(body, "description", kind)?.map(str::to_string),
            run_condition: ProviderBuilder::parse_optional(body, "runCondition")?,
            kind: kind_builder,
        })
    }

    pub fn build(&self, deps: &Dependencies) -> Trigger {
        let kind = match &self.kind {
            TriggerKindBuilder::Http {
                endpoint,
                http_response,
            } => TriggerKind::Http(HttpTrigger {
                path: PathTemplate::parse(&endpoint.path),
                http_verb: endpoint.http_verb.clone(),
                request_validation_errors: endpoint
                    .request_validation_errors
                    .iter()
                    .map(|c| c.build(deps))
                    .collect(),
                http_response: http_response.as_ref().map(|r| r.build(deps)),
            }),
            TriggerKindBuilder::Event {
                event_type,
                custom_event_alias,
            } => TriggerKind::Event(EventTrigger {
                event_type: event_type.clone(),
                custom_event_alias: custom_event_alias.clone(),
            }),
            TriggerKindBuilder::Periodic {
                recurrence,
                time_zone_id,
            } => TriggerKind::Periodic(PeriodicTrigger {
                recurrence: recurrence.clone(),
                time_zone_id: time_zone_id.clone(),
            }),
        };

        Trigger {
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            run_condition: self.run_condition.as_ref().map(|c| c.build(deps)),
            kind,
        }
    }
}

impl EndpointBuilder {
    fn parse(value: &Value) -> BuildResult<Self> {
        const KIND: &str = "endpoint";
        let object = as_object(value, KIND)?;
        Ok(Self {
            path: required_str(object, "path", KIND)?.to_string(),
            http_verb: required_str(object, "httpVerb", KIND)?.to_ascii_uppercase(),
            request_validation_errors: ErrorConditionBuilder::parse_list(
                object,
                "requestValidationErrors",
            )?,
        })
    }
}

impl HttpResponseBuilder {
    fn parse(value: &Value) -> BuildResult<Self> {
        let object = as_object(value, "httpResponse")?;
        Ok(Self {
            http_status_code: ProviderBuilder::parse_optional(object, "httpStatusCode")?,
            headers: match object.get("headers") {
                None | Some(Value::Null) => Vec::new(),
                Some(headers) => as_object(headers, "headers")?
                    .iter()
                    .map(|(name, v)| Ok((name.clone(), ProviderBuilder::parse(v)?)))
                    .collect::<BuildResult<_>>()?,
            },
            content_type: ProviderBuilder::parse_optional(object, "contentType")?,
            content: ProviderBuilder::parse_optional(object, "content")?,
        })
    }

    fn build(&self, deps: &Dependencies) -> HttpResponseTemplate {
        HttpResponseTemplate {
            http_status_code: self.http_status_code.as_ref().map(|b| b.build(deps)),
            headers: self
                .headers
                .iter()
                .map(|(name, b)| (name.clone(), b.build(deps)))
                .collect(),
            content_type: self.content_type.as_ref().map(|b| b.build(deps)),
            content: self.content.as_ref().map(|b| b.build(deps)),
        }
    }
}

/// Cron-style recurrence of a periodic trigger; omitted fields mean "every"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Recurrence {
    #[serde(default = "every")]
    pub minute: String,
    #[serde(default = "every")]
    pub hour: String,
    #[serde(default = "every")]
    pub day_of_month: String,
    #[serde(default = "every")]
    pub month: String,
    #[serde(default = "every")]
    pub day_of_week: String,
}

fn every() -> String {
    "*".to_string()
}

impl Recurrence {
    fn parse(value: &Value) -> BuildResult<Self> {
        let recurrence: Recurrence = serde_json::from_value(value.clone())
            .map_err(|e| malformed("recurrence", format!("Invalid recurrence: {}", e)))?;
        // A blank or space-separated field would shift the remaining fields
        if let Some(field) = recurrence
            .fields()
            .into_iter()
            .find(|f| f.is_empty() || f.contains(char::is_whitespace))
        {
            return Err(malformed(
                "recurrence",
                format!("\"{}\" is not a valid recurrence field.", field),
            ));
        }
        let expression = recurrence.cron_expression();
        Cron::new(&expression).parse().map_err(|e| {
            malformed(
                "recurrence",
                format!("\"{}\" is not a valid recurrence: {}", expression, e),
            )
        })?;
        Ok(recurrence)
    }

    fn fields(&self) -> [&str; 5] {
        [
            &self.minute,
            &self.hour,
            &self.day_of_month,
            &self.month,
            &self.day_of_week,
        ]
    }

    /// Five-field cron expression for the external scheduler
    pub fn cron_expression(&self) -> String {
        self.fields().join(" ")
    }
}

// ==================== Runtime ====================

/// A compiled trigger
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<BoxedProvider>,
    pub kind: TriggerKind,
}

#[derive(Debug, Clone)]
pub enum TriggerKind {
    Http(HttpTrigger),
    Event(EventTrigger),
    Periodic(PeriodicTrigger),
}

impl Trigger {
    /// Absent run conditions hold
    pub async fn run_condition_holds(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<bool> {
        match &self.run_condition {
            Some(condition) => ctx.resolve_bool(condition.as_ref()).await,
            None => Ok(true),
        }
    }

    pub fn as_http(&self) -> Option<&HttpTrigger> {
        match &self.kind {
            TriggerKind::Http(http) => Some(http),
            _ => None,
        }
    }

    pub fn as_periodic(&self) -> Option<&PeriodicTrigger> {
        match &self.kind {
            TriggerKind::Periodic(periodic) => Some(periodic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTrigger {
    pub path: PathTemplate,
    pub http_verb: String,
    pub request_validation_errors: Vec<ErrorCondition>,
    pub http_response: Option<HttpResponseTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTrigger {
    pub event_type: String,
    pub custom_event_alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicTrigger {
    pub recurrence: Recurrence,
    pub time_zone_id: Option<String>,
}

/// Configured response of an HTTP trigger
#[derive(Debug, Clone)]
pub struct HttpResponseTemplate {
    pub http_status_code: Option<BoxedProvider>,
    pub headers: Vec<(String, BoxedProvider)>,
    pub content_type: Option<BoxedProvider>,
    pub content: Option<BoxedProvider>,
}

impl HttpResponseTemplate {
    /// Resolve the response against the finished execution context
    pub async fn render(&self, ctx: &mut ProviderContext<'_>) -> ProviderResult<HttpResponseData> {
        let status = match &self.http_status_code {
            Some(status) => {
                let code = ctx.resolve_i64(status.as_ref()).await?;
                u16::try_from(code)
                    .ok()
                    .filter(|code| (100..=599).contains(code))
                    .ok_or_else(|| {
                        ProviderError::invalid_type("httpStatusCode", "HTTP status code", &Value::from(code))
                    })?
            }
            None => 200,
        };

        let mut response = HttpResponseData::new(status);
        for (name, value) in &self.headers {
            if let Some(value) = ctx.resolve_optional_text(value.as_ref()).await? {
                response.headers.insert(name.clone(), value);
            }
        }
        if let Some(content) = &self.content {
            let content = ctx.resolve(content.as_ref()).await?;
            if !content.is_null() {
                response.content_type = Some(match &self.content_type {
                    Some(content_type) => ctx.resolve_text(content_type.as_ref()).await?,
                    None => "application/json".to_string(),
                });
                response.content = Some(content);
            }
        }
        Ok(response)
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
    fn test_parse_http_trigger() {
        let trigger = TriggerBuilder::parse(&json!({"httpTrigger": {
            "name": "Quote submitted",
            "alias": "onQuote",
            "endpoint": {"path": "quotes/{quoteId}", "httpVerb": "post",
                "requestValidationErrors": [{"condition": false, "error": {
                    "code": "c", "title": "t", "message": "m", "httpStatusCode": 400}}]},
            "httpResponse": {"httpStatusCode": 202, "content": {"static": {"ok": true}}}
        }}))
        .unwrap();

        assert_eq!(trigger.alias, "onQuote");
        match &trigger.kind {
            TriggerKindBuilder::Http {
                endpoint,
                http_response,
            } => {
                assert_eq!(endpoint.http_verb, "POST");
                assert_eq!(endpoint.request_validation_errors.len(), 1);
                assert!(http_response.is_some());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_two_kinds() {
        let err = TriggerBuilder::parse(&json!({
            "httpTrigger": {}, "eventTrigger": {}
        }))
        .unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
    }

    #[test]
    fn test_missing_endpoint_names_trigger() {
        let err = TriggerBuilder::parse(&json!({"httpTrigger": {"name": "x", "alias": "x"}}))
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);
        assert!(err.additional_details.contains(&"Trigger alias: x".to_string()));
    }

    #[test]
    fn test_recurrence_defaults_and_validation() {
        let trigger = TriggerBuilder::parse(&json!({"periodicTrigger": {
            "name": "Nightly", "alias": "nightly",
            "recurrence": {"minute": "0", "hour": "2"},
            "timeZoneId": "Australia/Sydney"
        }}))
        .unwrap();
        match trigger.kind {
            TriggerKindBuilder::Periodic { recurrence, time_zone_id } => {
                assert_eq!(recurrence.cron_expression(), "0 2 * * *");
                assert_eq!(time_zone_id.as_deref(), Some("Australia/Sydney"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let err = TriggerBuilder::parse(&json!({"periodicTrigger": {
            "name": "Bad", "alias": "bad", "recurrence": {"minute": "0; rm"}
        }}))
        .unwrap_err();
        assert_eq!(err.code, codes::MALFORMED_CONFIGURATION);
    }

    #[test]
    fn test_recurrence_rejects_out_of_range_fields() {
        let invalid = [
            json!({"minute": "banana"}),
            json!({"hour": "25"}),
            json!({"minute": "99"}),
            json!({"minute": "5-"}),
            json!({"hour": ",,"}),
            json!({"dayOfMonth": "0"}),
            json!({"month": "13"}),
            json!({"minute": "0 1"}),
            json!({"hour": ""}),
        ];
        for recurrence in invalid {
            let err = TriggerBuilder::parse(&json!({"periodicTrigger": {
                "name": "Bad", "alias": "bad", "recurrence": recurrence.clone()
            }}))
            .unwrap_err();
            assert_eq!(err.code, codes::MALFORMED_CONFIGURATION, "{}", recurrence);
        }

        let trigger = TriggerBuilder::parse(&json!({"periodicTrigger": {
            "name": "Weekdays", "alias": "weekdays",
            "recurrence": {"minute": "*/15", "hour": "8-17", "dayOfWeek": "MON-FRI"}
        }}))
        .unwrap();
        match trigger.kind {
            TriggerKindBuilder::Periodic { recurrence, .. } => {
                assert_eq!(recurrence.cron_expression(), "*/15 8-17 * * MON-FRI");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_render_response() {
        let builder = HttpResponseBuilder::parse(&json!({
            "httpStatusCode": 201,
            "headers": {"Location": {"templateText": "/quotes/{{ trigger.httpRequest.content.quoteId }}"}},
            "content": {"object": {"id": {"objectPathLookupText": "/trigger/httpRequest/content/quoteId"}}}
        }))
        .unwrap();
        let template = builder.build(&Dependencies::new());

        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let response = template.render(&mut ctx).await.unwrap();

        assert_eq!(response.http_status_code, 201);
        assert_eq!(response.headers["Location"], "/quotes/q-1");
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.content, Some(json!({"id": "q-1"})));
    }

    #[tokio::test]
    async fn test_render_rejects_bad_status() {
        let template = HttpResponseBuilder::parse(&json!({"httpStatusCode": 42}))
            .unwrap()
            .build(&Dependencies::new());
        let mut data = sample_data();
        let mut ctx = ProviderContext::new(&mut data, CancellationToken::new());
        let err = template.render(&mut ctx).await.unwrap_err();
        assert_eq!(err.error_data().code, codes::INVALID_TYPE);
    }
}
