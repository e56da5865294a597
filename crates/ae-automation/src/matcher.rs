//! Structural trigger matching
//!
//! Decides whether a trigger could handle an invocation by looking only at
//! the trigger data: verb and endpoint path for HTTP, event type and custom
//! event alias for events. Run conditions are evaluated by the caller.

use ae_core::EventType;
use ae_data::http::split_segments;
use ae_data::{EventTriggerData, HttpRequestData, TriggerData};
use indexmap::IndexMap;
use tracing::trace;

use crate::trigger::{EventTrigger, HttpTrigger, Trigger, TriggerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Static(String),
    Token(String),
}

/// Endpoint path with optional `{token}` segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let segments = split_segments(template)
            .into_iter()
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    Some(token) if !token.is_empty() => PathSegment::Token(token.to_string()),
                    _ => PathSegment::Static(segment),
                }
            })
            .collect();
        Self {
            template: template.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Token values when every segment lines up, `None` otherwise
    ///
    /// Segment counts must be equal and static segments must be identical.
    pub fn captures(&self, segments: &[String]) -> Option<IndexMap<String, String>> {
        if segments.len() != self.segments.len() {
            return None;
        }
        let mut parameters = IndexMap::new();
        for (expected, actual) in self.segments.iter().zip(segments) {
            match expected {
                PathSegment::Static(value) if value == actual => {}
                PathSegment::Static(_) => return None,
                PathSegment::Token(name) => {
                    parameters.insert(name.clone(), actual.clone());
                }
            }
        }
        Some(parameters)
    }
}

impl HttpTrigger {
    /// Path parameters when verb and path match
    pub fn matches(&self, request: &HttpRequestData) -> Option<IndexMap<String, String>> {
        if !self.http_verb.eq_ignore_ascii_case(&request.http_verb) {
            return None;
        }
        self.path.captures(&request.path_segments)
    }
}

impl EventTrigger {
    /// A trigger without a custom event alias accepts every alias
    pub fn matches(&self, event: &EventTriggerData) -> bool {
        if !self.event_type.eq_ignore_ascii_case(&event.event_type) {
            return false;
        }
        match &self.custom_event_alias {
            Some(alias) if EventType::new(self.event_type.as_str()).is_custom() => {
                event.custom_event_alias.as_deref() == Some(alias.as_str())
            }
            _ => true,
        }
    }
}

impl Trigger {
    /// Structural match against an invocation's trigger data
    ///
    /// Yields the captured path parameters; empty for non-HTTP triggers.
    pub fn structural_match(&self, data: &TriggerData) -> Option<IndexMap<String, String>> {
        let matched = match (&self.kind, data) {
            (TriggerKind::Http(trigger), TriggerData::Http(http)) => {
                trigger.matches(&http.http_request)
            }
            (TriggerKind::Event(trigger), TriggerData::Event(event)) => {
                trigger.matches(event).then(IndexMap::new)
            }
            _ => None,
        };
        trace!(
            trigger_alias = %self.alias,
            matched = matched.is_some(),
            "Checked trigger"
        );
        matched
    }
}
