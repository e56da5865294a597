//! Lazy value resolution for automations
//!
//! Every configured value of an automation (URLs, headers, bodies,
//! conditions) is a [`Provider`]: a node compiled once from JSON by a
//! [`ProviderBuilder`] and resolved on demand against the execution context
//! of each invocation. Conditions are providers that resolve to a boolean.
//!
//! Collaborators outside the engine are reached only through the capability
//! traits in [`Dependencies`].

mod builder;
mod comparison;
mod condition;
mod dependencies;
mod entity;
mod error;
mod expression;
pub mod parse;
mod path;
mod provider;
pub mod testing;
mod text;
mod time;
mod value;

pub use builder::{ProviderBuilder, PROVIDER_KEYS};
pub use comparison::{NumericKind, TemporalKind};
pub use condition::{LogicalOperator, TextOperator};
pub use dependencies::{
    BackgroundActionJob, Clock, Dependencies, EmailSender, EntityLookup, EventPublisher,
    HttpClient, JobQueue, SystemClock,
};
pub use error::{kind_name, ProviderError, ProviderResult};
pub use path::{ExpectedType, PathLookup};
pub use provider::{BoxedProvider, Provider, ProviderContext};
pub use value::StaticValue;
