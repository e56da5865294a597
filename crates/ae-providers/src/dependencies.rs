//! Capabilities injected into compiled providers and actions
//!
//! Collaborators outside the engine (outbound HTTP, entity storage, the
//! background job facility, email transport) are reached only through the
//! narrow traits in this module. A `Dependencies` value is handed to every
//! `build` call once, when a configuration is compiled.

use std::fmt;
use std::sync::Arc;

use ae_core::{codes, ErrorData, Event, TenantContext};
use ae_data::{ActionLocation, EmailData, HttpRequestData, HttpResponseData};
use ae_template::TemplateEngine;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Outbound HTTP
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        request: HttpRequestData,
        cancellation: &CancellationToken,
    ) -> Result<HttpResponseData, ErrorData>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Entity storage lookups
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// `Ok(None)` when no entity has that id
    async fn find(
        &self,
        tenant: &TenantContext,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<Value>, ErrorData>;
}

/// An asynchronous action handed to the background facility
///
/// The snapshot is a serialized copy of the execution context at the time
/// the action was reached; the background run never touches the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundActionJob {
    pub automation_alias: String,
    pub action: ActionLocation,
    pub snapshot: String,
}

/// Background execution facility
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: BackgroundActionJob) -> Result<(), ErrorData>;
}

/// Publishes events raised by actions
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> Result<(), ErrorData>;
}

/// Email transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: EmailData) -> Result<(), ErrorData>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stand-in for capabilities the host did not configure
#[derive(Debug, Clone, Copy, Default)]
struct Unconfigured;

fn not_configured(capability: &str) -> ErrorData {
    ErrorData::engine_error(format!("No {} is configured for this engine.", capability))
        .with_detail(format!("Capability: {}", capability))
}

#[async_trait]
impl HttpClient for Unconfigured {
    async fn send(
        &self,
        request: HttpRequestData,
        _cancellation: &CancellationToken,
    ) -> Result<HttpResponseData, ErrorData> {
        Err(ErrorData::new(
            codes::PROVIDER_HTTP_FAILED,
            "HTTP request failed",
            "No HTTP client is configured for this engine.",
            500,
        )
        .with_detail(format!("URL: {}", request.url)))
    }
}

#[async_trait]
impl EntityLookup for Unconfigured {
    async fn find(
        &self,
        _tenant: &TenantContext,
        _entity_type: &str,
        _entity_id: &str,
    ) -> Result<Option<Value>, ErrorData> {
        Err(not_configured("entity lookup"))
    }
}

#[async_trait]
impl JobQueue for Unconfigured {
    async fn enqueue(&self, _job: BackgroundActionJob) -> Result<(), ErrorData> {
        Err(not_configured("job queue"))
    }
}

#[async_trait]
impl EventPublisher for Unconfigured {
    async fn publish(&self, _event: Event) -> Result<(), ErrorData> {
        Err(not_configured("event publisher"))
    }
}

#[async_trait]
impl EmailSender for Unconfigured {
    async fn send(&self, _email: EmailData) -> Result<(), ErrorData> {
        Err(not_configured("email sender"))
    }
}

/// Capabilities available to compiled nodes
#[derive(Clone)]
pub struct Dependencies {
    pub templates: Arc<TemplateEngine>,
    pub clock: Arc<dyn Clock>,
    pub http_client: Arc<dyn HttpClient>,
    pub entities: Arc<dyn EntityLookup>,
    pub jobs: Arc<dyn JobQueue>,
    pub events: Arc<dyn EventPublisher>,
    pub email: Arc<dyn EmailSender>,
}

impl Dependencies {
    /// System clock, a fresh template engine, and no external collaborators
    pub fn new() -> Self {
        Self {
            templates: Arc::new(TemplateEngine::new()),
            clock: Arc::new(SystemClock),
            http_client: Arc::new(Unconfigured),
            entities: Arc::new(Unconfigured),
            jobs: Arc::new(Unconfigured),
            events: Arc::new(Unconfigured),
            email: Arc::new(Unconfigured),
        }
    }

    pub fn with_templates(mut self, templates: Arc<TemplateEngine>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_entities(mut self, entities: Arc<dyn EntityLookup>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub fn with_email(mut self, email: Arc<dyn EmailSender>) -> Self {
        self.email = email;
        self
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_capabilities_fail_cleanly() {
        let deps = Dependencies::new();
        let err = deps
            .http_client
            .send(
                HttpRequestData::new("GET", "https://x.test/a"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::PROVIDER_HTTP_FAILED);
        assert!(err.additional_details.contains(&"URL: https://x.test/a".to_string()));

        let tenant = TenantContext::new("t", "p", Default::default());
        let err = deps.entities.find(&tenant, "quote", "1").await.unwrap_err();
        assert_eq!(err.code, codes::ENGINE_ERROR);
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = BackgroundActionJob {
            automation_alias: "a".into(),
            action: ActionLocation::root("notify"),
            snapshot: "{}".into(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["automationAlias"], "a");
        let back: BackgroundActionJob = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}
