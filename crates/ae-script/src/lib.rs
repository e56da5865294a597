//! Action Engine
//!
//! Actions are the steps an automation performs once one of its triggers
//! matched. Each action is compiled once from configuration and executed
//! per invocation, recording its progress into the execution context under
//! `/actions/<alias>`.
//!
//! # Action Types
//!
//! - HTTP requests
//! - Variable assignment
//! - Raising events
//! - Groups of child actions
//! - Iteration over a list
//! - Sending email
//! - Raising a configured error
//!
//! # Key Types
//!
//! - [`ActionBuilder`] - Parsed action configuration
//! - [`Action`] - A compiled action
//! - [`ActionExecutor`] - Executes action trees

pub mod action;
pub mod builder;
pub mod error;
pub mod error_condition;
pub mod executor;

pub use action::{Action, ActionKind};
pub use builder::{parse_actions, ActionBuilder, ActionKindBuilder, ACTION_KEYS};
pub use error::{ActionError, ActionResult};
pub use error_condition::{parse_error_payload, ErrorCondition, ErrorConditionBuilder};
pub use executor::ActionExecutor;
