//! Automation engine
//!
//! Hosts the compiled automation configurations of every release and runs
//! them for inbound HTTP requests, domain events and periodic ticks.
//!
//! # Architecture
//!
//! ```text
//! HTTP request ─┐
//! Event bus ────┼─→ AutomationEngine → release configuration → Automation
//! Scheduler ────┘            │
//!                            └─→ background worker ← ChannelJobQueue ← async actions
//! ```
//!
//! # Key Types
//!
//! - [`AutomationEngine`] - Release registry and invocation entry points
//! - [`ReleaseKey`] - Tenant, product and environment of a configuration
//! - [`ReqwestHttpClient`] - Outbound HTTP for `httpRequestAction`

pub mod capabilities;
pub mod engine;
pub mod error;
pub mod release;
pub mod worker;

pub use capabilities::{EventBusPublisher, LogEmailSender, ReqwestHttpClient};
pub use engine::{error_response, AutomationEngine, HttpInvocation, PeriodicSchedule};
pub use error::{EngineError, EngineResult};
pub use release::ReleaseKey;
pub use worker::{ChannelJobQueue, JobReceiver, PendingJobs};
