//! Core types for the automation engine
//!
//! This crate provides the fundamental types used throughout the automation
//! engine: the structured [`ErrorData`] payload, path lookup against JSON
//! documents, domain [`Event`]s, the [`TenantContext`] an invocation runs in,
//! and the discriminator-keyed node parsing shared by every configuration
//! builder.

mod context;
mod discriminator;
mod error;
mod event;
pub mod pointer;

pub use context::{DeploymentEnvironment, TenantContext};
pub use discriminator::{single_discriminator, sole_discriminator, DiscriminatedNode};
pub use error::ErrorData;
pub use event::{Event, EventOrigin, EventType};
pub use pointer::{PathOutcome, PointerError};

/// Machine-readable error codes carried by [`ErrorData::code`]
pub mod codes {
    /// A path lookup found nothing and no fallback was configured
    pub const PATH_NOT_FOUND: &str = "automation.providers.path.not.found";

    /// A path could not be walked (null intermediate, malformed pointer)
    pub const PATH_RESOLUTION_ERROR: &str = "automation.providers.path.resolution.error";

    /// A resolved value did not have the expected type
    pub const INVALID_TYPE: &str = "automation.providers.invalid.type";

    /// A computed expression failed to evaluate
    pub const EXPRESSION_FAILED: &str = "automation.providers.expression.evaluation.failed";

    /// A text template failed to render
    pub const TEMPLATE_FAILED: &str = "automation.providers.template.render.failed";

    /// An entity lookup returned nothing
    pub const ENTITY_NOT_FOUND: &str = "automation.providers.entity.not.found";

    /// An outbound HTTP request made while resolving a value failed
    pub const PROVIDER_HTTP_FAILED: &str = "automation.providers.http.request.failed";

    pub const DISTINCT_AUTOMATION_ALIAS: &str =
        "automation.configuration.should.have.distinct.automation.alias";
    pub const DISTINCT_TRIGGER_ALIAS: &str =
        "automation.configuration.should.have.distinct.trigger.alias";
    pub const DISTINCT_ACTION_ALIAS: &str =
        "automation.configuration.should.have.distinct.action.alias";
    pub const INVALID_DISCRIMINATOR: &str = "automation.configuration.invalid.discriminator";
    pub const MISSING_PROPERTY: &str = "automation.configuration.missing.property";
    pub const MALFORMED_CONFIGURATION: &str = "automation.configuration.malformed.json";
    pub const UNSUPPORTED_SCHEMA_VERSION: &str =
        "automation.configuration.unsupported.schema.version";

    /// The outbound request of an HTTP request action failed
    pub const ACTION_HTTP_FAILED: &str = "automation.action.http.request.failed";

    /// An action failed in a way the configuration did not anticipate
    pub const ACTION_FAILED: &str = "automation.action.execution.failed";

    /// The originating request was cancelled
    pub const CANCELLED: &str = "automation.execution.cancelled";

    /// No configured trigger matched the request
    pub const TRIGGER_NOT_FOUND: &str = "automation.trigger.not.found";

    /// Generic engine failure
    pub const ENGINE_ERROR: &str = "automation.engine.error";
}
