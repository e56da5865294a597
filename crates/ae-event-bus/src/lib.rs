//! Event bus for automation domain events
//!
//! Host applications fire domain events here, `raiseEventAction` publishes
//! custom events here, and the engine's event listener consumes them to run
//! event-triggered automations.

use ae_core::{Event, EventType};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to events
///
/// Subscribers register for one event type or for all events (MATCH_ALL).
/// Custom events share the `custom` event type; subscribers filter on the
/// custom event alias themselves.
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event>>,
    /// Special sender for MATCH_ALL subscribers
    match_all_sender: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to all subscribers
    ///
    /// The event will be delivered to:
    /// 1. All subscribers of the specific event type
    /// 2. All MATCH_ALL subscribers
    ///
    /// Returns the number of receivers the event reached.
    pub fn fire(&self, event: Event) -> usize {
        debug!(
            event_type = %event.event_type,
            custom_event_alias = ?event.custom_event_alias,
            tenant = %event.context.tenant_id,
            "Firing event"
        );

        let mut delivered = 0;
        if let Some(sender) = self.listeners.get(&event.event_type) {
            // a send error only means there are no active receivers
            delivered += sender.send(event.clone()).unwrap_or(0);
        }
        delivered + self.match_all_sender.send(event).unwrap_or(0)
    }

    /// Get the number of active event type subscriptions
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::{DeploymentEnvironment, TenantContext};
    use serde_json::json;

    fn ctx() -> TenantContext {
        TenantContext::new("acme", "motor", DeploymentEnvironment::Development)
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("quoteCreated");

        let delivered = bus.fire(Event::new("quoteCreated", json!({"key": "value"}), ctx()));
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "quoteCreated");
        assert_eq!(received.data["key"], "value");
    }

    #[tokio::test]
    async fn test_match_all_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventType::match_all());

        bus.fire(Event::new("event_a", json!({}), ctx()));
        bus.fire(Event::custom("reviewed", json!({}), ctx()));

        let event1 = rx.recv().await.unwrap();
        let event2 = rx.recv().await.unwrap();

        assert_eq!(event1.event_type.as_str(), "event_a");
        assert_eq!(event2.custom_event_alias.as_deref(), Some("reviewed"));
    }

    #[tokio::test]
    async fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("event_a");
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"}), ctx()));

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received.data["type"], "a");
        assert!(rx_b.try_recv().is_err());
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn test_fire_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.fire(Event::new("nobody", json!(null), ctx())), 0);
    }
}
