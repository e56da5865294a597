//! Execution context for automation invocations
//!
//! An [`AutomationData`] is created once per trigger invocation by the
//! [`AutomationDataFactory`], mutated by exactly one execution flow, and
//! serialized whole when an action is handed to background execution.

mod action;
mod automation_data;
mod error;
mod factory;
pub mod http;
mod trigger;

pub use action::{
    ActionData, ActionDetail, ActionLocation, ActionScope, ActionState, EmailData, IterationData,
};
pub use automation_data::{AutomationData, ContextEntities, SystemData};
pub use error::{DataError, DataResult};
pub use factory::{AutomationDataFactory, TriggerRequest};
pub use http::{HttpRequestData, HttpResponseData};
pub use trigger::{EventTriggerData, HttpTriggerData, PeriodicTriggerData, TriggerData};
