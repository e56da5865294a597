//! Data produced by the trigger that started an automation

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{HttpRequestData, HttpResponseData};

/// Trigger data, tagged by the kind of trigger that fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "triggerType", rename_all = "camelCase")]
pub enum TriggerData {
    Http(HttpTriggerData),
    Event(EventTriggerData),
    Periodic(PeriodicTriggerData),
}

impl TriggerData {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerData::Http(_) => "http",
            TriggerData::Event(_) => "event",
            TriggerData::Periodic(_) => "periodic",
        }
    }

    pub fn as_http(&self) -> Option<&HttpTriggerData> {
        match self {
            TriggerData::Http(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_http_mut(&mut self) -> Option<&mut HttpTriggerData> {
        match self {
            TriggerData::Http(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventTriggerData> {
        match self {
            TriggerData::Event(data) => Some(data),
            _ => None,
        }
    }
}

/// Data for an HTTP trigger invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTriggerData {
    pub http_request: HttpRequestData,

    /// Values captured by `{token}` segments of the matched endpoint path
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub path_parameters: IndexMap<String, String>,

    /// Response returned to the caller, populated from the trigger's
    /// response configuration or by actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponseData>,
}

impl HttpTriggerData {
    pub fn new(http_request: HttpRequestData) -> Self {
        Self {
            http_request,
            path_parameters: IndexMap::new(),
            http_response: None,
        }
    }
}

/// Data for an event trigger invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTriggerData {
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_event_alias: Option<String>,

    #[serde(default)]
    pub event_data: Value,

    pub time_fired: DateTime<Utc>,
}

/// Data for a periodic trigger invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTriggerData {
    pub fired_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_serialization() {
        let data = TriggerData::Http(HttpTriggerData::new(HttpRequestData::new("GET", "/a/b")));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["triggerType"], "http");
        assert_eq!(json["httpRequest"]["pathSegments"], json!(["a", "b"]));
        assert!(json.get("httpResponse").is_none());
    }

    #[test]
    fn test_event_round_trip_keeps_time() {
        let fired = "2026-03-01T10:15:30.123456789Z".parse::<DateTime<Utc>>().unwrap();
        let data = TriggerData::Event(EventTriggerData {
            event_type: "custom".into(),
            custom_event_alias: Some("quoteReviewed".into()),
            event_data: json!({"quoteId": "q-1"}),
            time_fired: fired,
        });

        let text = serde_json::to_string(&data).unwrap();
        let back: TriggerData = serde_json::from_str(&text).unwrap();
        assert_eq!(back, data);
        assert_eq!(back.as_event().unwrap().time_fired, fired);
    }
}
