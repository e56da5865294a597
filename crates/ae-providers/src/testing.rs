//! In-memory capability fakes shared by the workspace's tests

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use ae_core::{DeploymentEnvironment, ErrorData, Event, TenantContext};
use ae_data::{
    AutomationData, AutomationDataFactory, EmailData, HttpRequestData, HttpResponseData,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::dependencies::{
    BackgroundActionJob, Clock, EmailSender, EntityLookup, EventPublisher, HttpClient, JobQueue,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A POST request context with JSON content, for unit tests
pub fn sample_data() -> AutomationData {
    let request = HttpRequestData::new("POST", "https://app.test/api/quotes/q-1?draft=true")
        .with_action_path("/quotes/q-1")
        .with_content("application/json", json!({"quoteId": "q-1", "amount": 120}));
    AutomationDataFactory::for_http(
        TenantContext::new("acme", "motor", DeploymentEnvironment::Development),
        request,
        Utc::now(),
    )
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Panics on an unparsable timestamp; test input only
    pub fn at(timestamp: &str) -> Self {
        match timestamp.parse() {
            Ok(at) => Self(at),
            Err(e) => panic!("invalid test timestamp {:?}: {}", timestamp, e),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Records requests and answers with queued or default responses
///
/// Responses are matched by URL prefix, first registration wins; anything
/// unmatched gets `200` with an empty JSON object.
#[derive(Debug, Default)]
pub struct RecordingHttpClient {
    requests: Mutex<Vec<HttpRequestData>>,
    responses: Mutex<Vec<(String, Result<HttpResponseData, ErrorData>)>>,
}

impl RecordingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url_prefix: impl Into<String>, response: HttpResponseData) {
        lock(&self.responses).push((url_prefix.into(), Ok(response)));
    }

    pub fn fail(&self, url_prefix: impl Into<String>, error: ErrorData) {
        lock(&self.responses).push((url_prefix.into(), Err(error)));
    }

    pub fn requests(&self) -> Vec<HttpRequestData> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn send(
        &self,
        request: HttpRequestData,
        _cancellation: &CancellationToken,
    ) -> Result<HttpResponseData, ErrorData> {
        let response = lock(&self.responses)
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone());
        lock(&self.requests).push(request);
        response.unwrap_or_else(|| Ok(HttpResponseData::json(200, json!({}))))
    }
}

/// Entities keyed by type and id, shared by every tenant
#[derive(Debug, Default)]
pub struct InMemoryEntityLookup {
    entities: Mutex<HashMap<(String, String), Value>>,
}

impl InMemoryEntityLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity_type: &str, entity_id: &str, entity: Value) {
        lock(&self.entities).insert((entity_type.to_string(), entity_id.to_string()), entity);
    }
}

#[async_trait]
impl EntityLookup for InMemoryEntityLookup {
    async fn find(
        &self,
        _tenant: &TenantContext,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<Value>, ErrorData> {
        Ok(lock(&self.entities)
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct RecordingJobQueue {
    jobs: Mutex<Vec<BackgroundActionJob>>,
}

impl RecordingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<BackgroundActionJob> {
        lock(&self.jobs).clone()
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(&self, job: BackgroundActionJob) -> Result<(), ErrorData> {
        lock(&self.jobs).push(job);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: Event) -> Result<(), ErrorData> {
        lock(&self.events).push(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    emails: Mutex<Vec<EmailData>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emails(&self) -> Vec<EmailData> {
        lock(&self.emails).clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: EmailData) -> Result<(), ErrorData> {
        lock(&self.emails).push(email);
        Ok(())
    }
}
