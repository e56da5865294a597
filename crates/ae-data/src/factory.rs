//! Construction of execution contexts per trigger kind

use ae_core::{Event, TenantContext};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::automation_data::AutomationData;
use crate::http::HttpRequestData;
use crate::trigger::{EventTriggerData, HttpTriggerData, PeriodicTriggerData, TriggerData};

/// What started an invocation
#[derive(Debug, Clone)]
pub enum TriggerRequest {
    Http(HttpRequestData),
    Event(Event),
    Periodic { time_zone_id: Option<String> },
}

/// Builds the execution context for a trigger invocation
pub struct AutomationDataFactory;

impl AutomationDataFactory {
    pub fn create(tenant: TenantContext, request: TriggerRequest, now: DateTime<Utc>) -> AutomationData {
        let trigger = match request {
            TriggerRequest::Http(http_request) => {
                TriggerData::Http(HttpTriggerData::new(http_request))
            }
            TriggerRequest::Event(event) => TriggerData::Event(EventTriggerData {
                event_type: event.event_type.to_string(),
                custom_event_alias: event.custom_event_alias,
                event_data: event.data,
                time_fired: event.time_fired,
            }),
            TriggerRequest::Periodic { time_zone_id } => TriggerData::Periodic(PeriodicTriggerData {
                fired_at: now,
                time_zone_id,
            }),
        };
        debug!(
            tenant = %tenant.tenant_id,
            product = %tenant.product_id,
            environment = %tenant.environment,
            trigger_type = trigger.kind(),
            "Creating automation data"
        );
        AutomationData::new(tenant, trigger, now)
    }

    pub fn for_http(tenant: TenantContext, request: HttpRequestData, now: DateTime<Utc>) -> AutomationData {
        Self::create(tenant, TriggerRequest::Http(request), now)
    }

    /// The event's own context identifies the tenant
    pub fn for_event(event: Event, now: DateTime<Utc>) -> AutomationData {
        let tenant = event.context.child();
        Self::create(tenant, TriggerRequest::Event(event), now)
    }

    pub fn for_periodic(
        tenant: TenantContext,
        time_zone_id: Option<String>,
        now: DateTime<Utc>,
    ) -> AutomationData {
        Self::create(tenant, TriggerRequest::Periodic { time_zone_id }, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::DeploymentEnvironment;
    use serde_json::json;

    #[test]
    fn test_event_context_is_child_of_event() {
        let ctx = TenantContext::new("acme", "motor", DeploymentEnvironment::Production);
        let event = Event::custom("quoteReviewed", json!({"id": 1}), ctx.clone());
        let data = AutomationDataFactory::for_event(event, Utc::now());

        assert_eq!(data.system.tenant.parent_id.as_deref(), Some(ctx.id.as_str()));
        let trigger = data.trigger.as_event().unwrap();
        assert_eq!(trigger.custom_event_alias.as_deref(), Some("quoteReviewed"));
        assert_eq!(trigger.event_data["id"], 1);
    }

    #[test]
    fn test_periodic() {
        let ctx = TenantContext::new("acme", "motor", DeploymentEnvironment::Production);
        let now = Utc::now();
        let data = AutomationDataFactory::for_periodic(ctx, Some("Australia/Melbourne".into()), now);
        assert_eq!(data.trigger.kind(), "periodic");
        assert_eq!(data.system.created_at, now);
    }
}
