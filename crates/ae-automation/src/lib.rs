//! Automations
//!
//! Automations are JSON-configured rules that run an action tree when one of
//! their triggers matches an inbound HTTP request, a domain event or a
//! scheduled tick.
//!
//! # Architecture
//!
//! ```text
//! AUTOMATION = TRIGGER → REQUEST VALIDATION → RUN CONDITION → ACTIONS → RESPONSE
//! ```
//!
//! - **Triggers**: select the automation for an invocation
//! - **Run condition**: gates the whole action tree
//! - **Actions**: executed by ae-script
//! - **Response**: the HTTP trigger's configured response, rendered last
//!
//! # Key Types
//!
//! - [`Trigger`] - What starts an automation
//! - [`Automation`] - A compiled automation
//! - [`AutomationsConfiguration`] - All automations of one release

pub mod automation;
pub mod configuration;
pub mod error;
pub mod matcher;
pub mod trigger;

pub use automation::{Automation, AutomationBuilder};
pub use configuration::{AutomationsConfiguration, AutomationsConfigurationBuilder};
pub use error::{AliasKind, AutomationError, AutomationResult};
pub use matcher::PathTemplate;
pub use trigger::{
    EventTrigger, HttpResponseTemplate, HttpTrigger, PeriodicTrigger, Recurrence, Trigger,
    TriggerBuilder, TriggerKind, TRIGGER_KEYS,
};
