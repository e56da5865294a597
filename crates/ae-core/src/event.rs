//! Domain events raised by automations and consumed by event triggers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TenantContext;

/// Event type identifier
///
/// Built-in domain events use their own names (`quoteCreated`,
/// `policyIssued`). Events raised by configuration use [`EventType::CUSTOM`]
/// together with a custom event alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// Event type used for configuration-defined events
    pub const CUSTOM: &'static str = "custom";

    /// Create a new event type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Get the event type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Special event type that matches all events
    pub fn match_all() -> Self {
        Self("*".to_string())
    }

    /// Check if this is the MATCH_ALL event type
    pub fn is_match_all(&self) -> bool {
        self.0 == "*"
    }

    pub fn custom() -> Self {
        Self(Self::CUSTOM.to_string())
    }

    pub fn is_custom(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::CUSTOM)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event that can be fired on the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<T = serde_json::Value> {
    /// The type of event
    pub event_type: EventType,

    /// Alias distinguishing custom events from each other
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_event_alias: Option<String>,

    /// The event data
    pub data: T,

    /// Origin of the event
    #[serde(default)]
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// Tenant the event belongs to
    pub context: TenantContext,
}

impl<T> Event<T> {
    /// Create a new event with current timestamp
    pub fn new(event_type: impl Into<EventType>, data: T, context: TenantContext) -> Self {
        Self {
            event_type: event_type.into(),
            custom_event_alias: None,
            data,
            origin: EventOrigin::Local,
            time_fired: Utc::now(),
            context,
        }
    }

    /// Create a custom event identified by its alias
    pub fn custom(alias: impl Into<String>, data: T, context: TenantContext) -> Self {
        let mut event = Self::new(EventType::custom(), data, context);
        event.custom_event_alias = Some(alias.into());
        event
    }

    /// Create an event with a specific origin
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Whether the event was raised by an automation action
    pub fn is_from_automation(&self) -> bool {
        self.origin == EventOrigin::Automation
    }
}

/// Origin of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Raised by the host application
    #[default]
    Local,
    /// Raised by an automation action
    Automation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeploymentEnvironment;
    use serde_json::json;

    #[test]
    fn test_custom_event_serializes_alias() {
        let ctx = TenantContext::new("acme", "motor", DeploymentEnvironment::Development);
        let event = Event::custom("quoteReviewed", json!({"id": 7}), ctx)
            .with_origin(EventOrigin::Automation);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "custom");
        assert_eq!(json["customEventAlias"], "quoteReviewed");
        assert_eq!(json["origin"], "automation");

        let back: Event = serde_json::from_value(json).unwrap();
        assert!(back.event_type.is_custom());
        assert_eq!(back.time_fired, event.time_fired);
    }
}
