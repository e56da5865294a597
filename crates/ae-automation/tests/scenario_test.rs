//! End-to-end automation scenarios
//!
//! Each test loads a JSON automation document, selects the automation for a
//! request or event the way the engine does, and executes it against the
//! recording capability fakes.

use std::sync::Arc;

use ae_automation::{AutomationError, AutomationsConfiguration};
use ae_core::{codes, DeploymentEnvironment, Event, TenantContext};
use ae_data::{AutomationData, AutomationDataFactory, HttpRequestData, HttpResponseData};
use ae_providers::testing::{FixedClock, RecordingHttpClient};
use ae_providers::{Dependencies, ProviderContext};
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn tenant() -> TenantContext {
    TenantContext::new("acme", "motor", DeploymentEnvironment::Development)
}

fn deps(http: &Arc<RecordingHttpClient>) -> Dependencies {
    Dependencies::new()
        .with_clock(Arc::new(FixedClock::at("2026-03-01T10:00:00Z")))
        .with_http_client(http.clone())
}

fn load(automations: Value, deps: &Dependencies) -> AutomationsConfiguration {
    AutomationsConfiguration::load(
        json!({"schemaVersion": "1.0.0", "automations": automations}),
        deps,
    )
    .unwrap()
}

fn post(action_path: &str, content: Value) -> AutomationData {
    let request = HttpRequestData::new("POST", format!("https://app.test/automations{}", action_path))
        .with_action_path(action_path)
        .with_content("application/json", content);
    AutomationDataFactory::for_http(tenant(), request, Utc::now())
}

/// Select and execute, the way the engine handles an HTTP request
async fn handle(
    configuration: &AutomationsConfiguration,
    data: &mut AutomationData,
) -> Result<Option<String>, AutomationError> {
    let mut ctx = ProviderContext::new(data, CancellationToken::new());
    let Some(automation) = configuration.select(&mut ctx).await? else {
        return Ok(None);
    };
    automation.execute(&mut ctx).await?;
    Ok(Some(automation.alias.clone()))
}

fn response(data: &AutomationData) -> HttpResponseData {
    data.trigger
        .as_http()
        .and_then(|http| http.http_response.clone())
        .unwrap()
}

fn error(code: &str, status: u16) -> Value {
    json!({"code": code, "title": "Rejected", "message": "The request was rejected.", "httpStatusCode": status})
}

fn address_match(run_condition: Value, actions: Value) -> Value {
    json!([{
        "name": "Address match",
        "alias": "addressMatch",
        "runCondition": run_condition,
        "triggers": [{"httpTrigger": {
            "name": "Address match",
            "alias": "addressMatchTrigger",
            "endpoint": {"path": "addressMatch", "httpVerb": "POST"},
            "httpResponse": {
                "httpStatusCode": 200,
                "content": {"objectPathLookup": {
                    "path": "/actions/lookup/httpResponse/content",
                    "valueIfNotFound": {"static": {"matched": false}}
                }}
            }
        }}],
        "actions": actions
    }])
}

// ==================== HTTP triggers ====================

#[tokio::test]
async fn test_http_trigger_renders_response_from_action() {
    let http = Arc::new(RecordingHttpClient::new());
    http.respond(
        "https://address.test/",
        HttpResponseData::json(200, json!({"matched": true, "id": "addr-1"})),
    );
    let deps = deps(&http);
    let configuration = load(
        address_match(
            Value::Null,
            json!([{"httpRequestAction": {
                "name": "Lookup",
                "alias": "lookup",
                "httpVerb": "POST",
                "url": "https://address.test/match",
                "content": {"objectPathLookup": "/trigger/httpRequest/content"}
            }}]),
        ),
        &deps,
    );
    let mut data = post("/addressMatch", json!({"line1": "1 Main St"}));

    let matched = handle(&configuration, &mut data).await.unwrap();

    assert_eq!(matched.as_deref(), Some("addressMatch"));
    assert_eq!(http.requests()[0].content, Some(json!({"line1": "1 Main St"})));
    let response = response(&data);
    assert_eq!(response.http_status_code, 200);
    assert_eq!(response.content, Some(json!({"matched": true, "id": "addr-1"})));
    assert_eq!(data.system.trigger_alias.as_deref(), Some("addressMatchTrigger"));
}

#[tokio::test]
async fn test_false_automation_run_condition_still_renders_response() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let configuration = load(
        address_match(
            json!(false),
            json!([{"httpRequestAction": {
                "name": "Lookup", "alias": "lookup", "url": "https://address.test/match"
            }}]),
        ),
        &deps,
    );
    let mut data = post("/addressMatch", json!({}));

    handle(&configuration, &mut data).await.unwrap();

    assert!(data.actions.is_empty());
    assert!(http.requests().is_empty());
    assert_eq!(response(&data).content, Some(json!({"matched": false})));
}

#[tokio::test]
async fn test_before_run_error_aborts_automation() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let configuration = load(
        address_match(
            Value::Null,
            json!([{"httpRequestAction": {
                "name": "Lookup", "alias": "lookup", "url": "https://address.test/match",
                "beforeRunErrorConditions": [{"condition": true, "error": error("address.blocked", 403)}]
            }}]),
        ),
        &deps,
    );
    let mut data = post("/addressMatch", json!({}));

    let err = handle(&configuration, &mut data).await.unwrap_err();

    let payload = err.error_data();
    assert_eq!(payload.code, "address.blocked");
    assert_eq!(payload.title, "Rejected");
    assert_eq!(payload.message, "The request was rejected.");
    assert_eq!(payload.http_status_code, 403);
    assert!(http.requests().is_empty());
    assert_eq!(data.error.as_ref().unwrap().code, "address.blocked");
}

#[tokio::test]
async fn test_request_validation_error_rejects_before_actions() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let configuration = load(
        json!([{
            "name": "Quotes", "alias": "quotes",
            "triggers": [{"httpTrigger": {
                "name": "Submit", "alias": "submit",
                "endpoint": {"path": "quotes/{quoteId}", "httpVerb": "POST",
                    "requestValidationErrors": [{
                        "condition": {"not": {"pathExists": "/trigger/httpRequest/content/amount"}},
                        "error": error("quote.amount.required", 400)
                    }]}
            }}],
            "actions": [{"setVariableAction": {"name": "A", "alias": "a", "variableName": "a", "value": 1}}]
        }]),
        &deps,
    );
    let mut data = post("/quotes/q-7", json!({}));

    let err = handle(&configuration, &mut data).await.unwrap_err();

    assert!(matches!(err, AutomationError::RequestRejected(_)));
    assert_eq!(err.error_data().code, "quote.amount.required");
    assert!(data.actions.is_empty());
}

#[tokio::test]
async fn test_path_parameters_and_trigger_run_conditions() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let trigger = |alias: &str, condition: Value| {
        json!({"httpTrigger": {
            "name": alias, "alias": alias, "runCondition": condition,
            "endpoint": {"path": "quotes/{quoteId}", "httpVerb": "POST"},
            "httpResponse": {"content": {"object": {
                "handledBy": alias,
                "quoteId": {"objectPathLookupText": "/trigger/pathParameters/quoteId"}
            }}}
        }})
    };
    let configuration = load(
        json!([
            {"name": "Large", "alias": "large", "actions": [], "triggers": [trigger("largeQuote",
                json!({"integerCondition": {
                    "value": {"objectPathLookupInteger": "/trigger/httpRequest/content/amount"},
                    "isGreaterThan": 1000}}))]},
            {"name": "Any", "alias": "any", "actions": [], "triggers": [trigger("anyQuote", Value::Null)]}
        ]),
        &deps,
    );

    let mut small = post("/quotes/q-1", json!({"amount": 10}));
    assert_eq!(handle(&configuration, &mut small).await.unwrap().as_deref(), Some("any"));
    assert_eq!(
        response(&small).content,
        Some(json!({"handledBy": "anyQuote", "quoteId": "q-1"}))
    );

    let mut large = post("/quotes/q-2", json!({"amount": 5000}));
    assert_eq!(handle(&configuration, &mut large).await.unwrap().as_deref(), Some("large"));

    let mut other = post("/policies/p-1", json!({}));
    assert_eq!(handle(&configuration, &mut other).await.unwrap(), None);
}

#[tokio::test]
async fn test_unhandled_action_error_records_context_error() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let configuration = load(
        address_match(
            Value::Null,
            json!([
                {"setVariableAction": {"name": "Bad", "alias": "bad", "variableName": "x",
                    "value": {"objectPathLookup": "/trigger/httpRequest/content/missing"}}},
                {"setVariableAction": {"name": "Never", "alias": "never", "variableName": "y", "value": 1}}
            ]),
        ),
        &deps,
    );
    let mut data = post("/addressMatch", json!({}));

    let err = handle(&configuration, &mut data).await.unwrap_err();

    assert_eq!(err.error_data().code, codes::PATH_NOT_FOUND);
    assert_eq!(data.error.as_ref().unwrap().code, codes::PATH_NOT_FOUND);
    assert!(!data.actions.contains_key("never"));
    assert!(data.trigger.as_http().unwrap().http_response.is_none());
}

// ==================== Event triggers ====================

#[tokio::test]
async fn test_event_trigger_selects_by_custom_alias() {
    let http = Arc::new(RecordingHttpClient::new());
    let deps = deps(&http);
    let configuration = load(
        json!([{
            "name": "Reviewed", "alias": "reviewed",
            "triggers": [{"eventTrigger": {"name": "Reviewed", "alias": "onReviewed",
                "eventType": "custom", "customEventAlias": "quoteReviewed"}}],
            "actions": [{"setVariableAction": {"name": "Id", "alias": "id", "variableName": "quoteId",
                "value": {"objectPathLookupText": "/trigger/eventData/quoteId"}}}]
        }]),
        &deps,
    );

    let event = Event::custom("quoteReviewed", json!({"quoteId": "q-3"}), tenant());
    let mut data = AutomationDataFactory::for_event(event, Utc::now());
    assert_eq!(handle(&configuration, &mut data).await.unwrap().as_deref(), Some("reviewed"));
    assert_eq!(data.variables["quoteId"], json!("q-3"));

    let other = Event::custom("quoteDeclined", json!({}), tenant());
    let mut data = AutomationDataFactory::for_event(other, Utc::now());
    assert_eq!(handle(&configuration, &mut data).await.unwrap(), None);
}

// ==================== Validation ====================

#[test]
fn test_distinct_alias_codes() {
    let deps = Dependencies::new();
    let trigger = json!({"eventTrigger": {"name": "t", "alias": "t", "eventType": "quoteCreated"}});
    let set = |alias: &str| {
        json!({"setVariableAction": {"name": alias, "alias": alias, "variableName": alias, "value": 1}})
    };
    let document = |automations: Value| json!({"schemaVersion": "1.0.0", "automations": automations});

    let cases = [
        (
            json!([
                {"name": "a", "alias": "same", "triggers": [trigger.clone()], "actions": []},
                {"name": "b", "alias": "same", "triggers": [trigger.clone()], "actions": []}
            ]),
            codes::DISTINCT_AUTOMATION_ALIAS,
        ),
        (
            json!([{"name": "a", "alias": "a", "triggers": [trigger.clone(), trigger.clone()], "actions": []}]),
            codes::DISTINCT_TRIGGER_ALIAS,
        ),
        (
            json!([{"name": "a", "alias": "a", "triggers": [trigger.clone()], "actions": [
                set("x"),
                {"groupAction": {"name": "g", "alias": "g", "actions": [
                    {"iterateAction": {"name": "i", "alias": "i", "list": [], "actions": [set("x")]}}
                ]}}
            ]}]),
            codes::DISTINCT_ACTION_ALIAS,
        ),
    ];

    for (automations, code) in cases {
        let err = AutomationsConfiguration::load(document(automations), &deps).unwrap_err();
        assert_eq!(err.error_data().code, code);
    }
}
