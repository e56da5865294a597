//! Automation execution engine
//!
//! The [`AutomationEngine`] holds the compiled configuration of every
//! registered release and is the single entry point for invocations: inbound
//! HTTP requests, domain events (directly or from the event bus) and ticks of
//! an external periodic scheduler. It also owns the worker that runs
//! asynchronous actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ae_automation::{AutomationResult, AutomationsConfiguration};
use ae_core::{ErrorData, Event};
use ae_data::{AutomationData, AutomationDataFactory, HttpRequestData, HttpResponseData};
use ae_event_bus::EventBus;
use ae_providers::{BackgroundActionJob, Dependencies, ProviderContext};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::capabilities::EventBusPublisher;
use crate::error::{EngineError, EngineResult};
use crate::release::ReleaseKey;
use crate::worker::{ChannelJobQueue, JobReceiver, PendingJobs};

/// Outcome of an HTTP invocation
#[derive(Debug, Clone)]
pub struct HttpInvocation {
    /// What the caller receives
    pub response: HttpResponseData,
    /// Final state of the execution context
    pub data: AutomationData,
}

/// A periodic trigger registration for the external scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicSchedule {
    pub release: ReleaseKey,
    pub automation_alias: String,
    pub trigger_alias: String,
    pub cron_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

/// Automation engine that routes invocations to the configuration of their
/// release
pub struct AutomationEngine {
    /// Compiled configurations keyed by release
    releases: DashMap<ReleaseKey, Arc<AutomationsConfiguration>>,
    /// Capabilities every configuration is compiled with
    dependencies: Dependencies,
    /// Event bus for raised and host events
    event_bus: Arc<EventBus>,
    /// Background jobs, taken by the worker when it starts
    jobs: Mutex<Option<JobReceiver>>,
    /// Jobs queued or running
    pending: Arc<PendingJobs>,
    /// Event listener running flag
    listening: AtomicBool,
    /// Stops the listener and the worker
    shutdown: CancellationToken,
}

impl AutomationEngine {
    /// Create an engine around the host's capabilities
    ///
    /// The job queue and event publisher are replaced by the engine's own:
    /// jobs go to the background worker, raised events go to `event_bus`.
    pub fn new(event_bus: Arc<EventBus>, dependencies: Dependencies) -> Self {
        let (queue, receiver) = ChannelJobQueue::new();
        let pending = queue.pending();
        let dependencies = dependencies
            .with_jobs(Arc::new(queue))
            .with_events(Arc::new(EventBusPublisher::new(event_bus.clone())));

        Self {
            releases: DashMap::new(),
            dependencies,
            event_bus,
            jobs: Mutex::new(Some(receiver)),
            pending,
            listening: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Capabilities configurations must be compiled with to run here
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ==================== Registry ====================

    /// Register a compiled configuration, replacing the release's previous one
    pub fn register(
        &self,
        key: ReleaseKey,
        configuration: AutomationsConfiguration,
    ) -> Option<Arc<AutomationsConfiguration>> {
        info!(
            release = %key,
            automations = configuration.automations().len(),
            "Registering automation configuration"
        );
        self.releases.insert(key, Arc::new(configuration))
    }

    /// Compile a loaded document with the engine's capabilities and register it
    pub fn load(&self, key: ReleaseKey, document: Value) -> EngineResult<()> {
        let configuration = AutomationsConfiguration::load(document, &self.dependencies)?;
        self.register(key, configuration);
        Ok(())
    }

    pub fn unregister(&self, key: &ReleaseKey) -> Option<Arc<AutomationsConfiguration>> {
        self.releases.remove(key).map(|(_, configuration)| configuration)
    }

    pub fn configuration(&self, key: &ReleaseKey) -> Option<Arc<AutomationsConfiguration>> {
        self.releases.get(key).map(|entry| entry.value().clone())
    }

    fn require(&self, key: &ReleaseKey) -> EngineResult<Arc<AutomationsConfiguration>> {
        self.configuration(key)
            .ok_or_else(|| EngineError::NotRegistered(key.clone()))
    }

    // ==================== HTTP ====================

    /// Run the automation whose HTTP trigger matches the request
    ///
    /// Never fails: unmatched requests get `404`, unhandled errors get their
    /// payload with its status code.
    pub async fn handle_http_request(
        &self,
        key: &ReleaseKey,
        request: HttpRequestData,
        cancellation: CancellationToken,
    ) -> HttpResponseData {
        self.execute_http(key, request, cancellation).await.response
    }

    /// Like [`handle_http_request`](Self::handle_http_request), also
    /// returning the execution context
    #[instrument(skip_all, fields(release = %key, verb = %request.http_verb, path = %request.action_path))]
    pub async fn execute_http(
        &self,
        key: &ReleaseKey,
        request: HttpRequestData,
        cancellation: CancellationToken,
    ) -> HttpInvocation {
        let description = format!("{} {}", request.http_verb, request.action_path);
        let mut data = AutomationDataFactory::for_http(
            key.tenant_context(),
            request,
            self.dependencies.clock.now(),
        );

        let outcome = match self.require(key) {
            Ok(configuration) => {
                let mut ctx = ProviderContext::new(&mut data, cancellation);
                Self::run_matched(&configuration, &mut ctx)
                    .await
                    .map_err(EngineError::from)
            }
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(true) => data
                .trigger
                .as_http()
                .and_then(|http| http.http_response.clone())
                .unwrap_or_default(),
            Ok(false) => {
                debug!("No HTTP trigger matched");
                let payload = ErrorData::trigger_not_found(&description);
                data.set_error(payload.clone());
                error_response(&payload)
            }
            Err(e) => {
                let payload = e.error_data();
                data.set_error(payload.clone());
                error_response(&payload)
            }
        };
        HttpInvocation { response, data }
    }

    async fn run_matched(
        configuration: &AutomationsConfiguration,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<bool> {
        let Some(automation) = configuration.select(ctx).await? else {
            return Ok(false);
        };
        automation.execute(ctx).await?;
        Ok(true)
    }

    // ==================== Events ====================

    /// Run the automation whose event trigger best matches the event
    ///
    /// Automations are tried in declaration order, as for HTTP requests.
    /// `Ok(None)` when no trigger matches. An unhandled automation error is
    /// recorded at `/error` of the returned context; cancellation is returned
    /// as an error.
    #[instrument(skip_all, fields(release = %key, event_type = %event.event_type))]
    pub async fn handle_event(
        &self,
        key: &ReleaseKey,
        event: Event,
        cancellation: CancellationToken,
    ) -> EngineResult<Option<AutomationData>> {
        let configuration = self.require(key)?;
        let mut data = AutomationDataFactory::for_event(event, self.dependencies.clock.now());

        let outcome = {
            let mut ctx = ProviderContext::new(&mut data, cancellation);
            Self::run_matched(&configuration, &mut ctx).await
        };
        match outcome {
            Ok(false) => {
                debug!("No event trigger matched");
                Ok(None)
            }
            Ok(true) => Ok(Some(data)),
            Err(e) if e.is_cancelled() => Err(e.into()),
            Err(e) => {
                let payload = e.error_data();
                warn!(
                    automation_alias = ?data.system.automation_alias,
                    code = %payload.code,
                    "Event automation failed: {}",
                    payload.message
                );
                data.set_error(payload);
                Ok(Some(data))
            }
        }
    }

    /// Start handling every event fired on the bus
    ///
    /// Events are routed to the release named by their tenant context;
    /// events of unregistered releases are ignored.
    pub fn start_event_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!("Event listener already running");
            return None;
        }

        info!("Starting event listener");
        let mut events = self.event_bus.subscribe_all();
        let engine = Arc::clone(self);

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = events.recv() => {
                        match received {
                            Ok(event) => {
                                let engine = Arc::clone(&engine);
                                tokio::spawn(async move {
                                    engine.dispatch_event(event).await;
                                });
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Event listener lagged by {} events", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Event bus closed, stopping event listener");
                                break;
                            }
                        }
                    }
                    _ = engine.shutdown.cancelled() => {
                        info!("Received shutdown signal");
                        break;
                    }
                }
            }

            engine.listening.store(false, Ordering::SeqCst);
            info!("Event listener stopped");
        }))
    }

    async fn dispatch_event(&self, event: Event) {
        let key = ReleaseKey::from(&event.context);
        if !self.releases.contains_key(&key) {
            trace!(release = %key, "No configuration for event release");
            return;
        }
        if let Err(e) = self
            .handle_event(&key, event, self.shutdown.child_token())
            .await
        {
            warn!(release = %key, error = %e, "Error handling event");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    // ==================== Periodic ====================

    /// Every periodic trigger of every registered release
    pub fn periodic_schedules(&self) -> Vec<PeriodicSchedule> {
        let mut schedules: Vec<PeriodicSchedule> = self
            .releases
            .iter()
            .flat_map(|entry| {
                let release = entry.key().clone();
                entry
                    .value()
                    .periodic_triggers()
                    .map(|(automation, trigger, periodic)| PeriodicSchedule {
                        release: release.clone(),
                        automation_alias: automation.alias.clone(),
                        trigger_alias: trigger.alias.clone(),
                        cron_expression: periodic.recurrence.cron_expression(),
                        time_zone_id: periodic.time_zone_id.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        schedules.sort_by_key(|s| {
            (
                s.release.to_string(),
                s.automation_alias.clone(),
                s.trigger_alias.clone(),
            )
        });
        schedules
    }

    /// Run an automation for one tick of its periodic trigger
    ///
    /// `Ok(None)` when the trigger's run condition is false.
    #[instrument(skip_all, fields(release = %key, automation_alias = %automation_alias, trigger_alias = %trigger_alias))]
    pub async fn fire_periodic(
        &self,
        key: &ReleaseKey,
        automation_alias: &str,
        trigger_alias: &str,
        cancellation: CancellationToken,
    ) -> EngineResult<Option<AutomationData>> {
        let configuration = self.require(key)?;
        let automation = configuration
            .automation(automation_alias)
            .ok_or_else(|| EngineError::AutomationNotFound(automation_alias.to_string()))?;
        let (trigger, periodic) = automation
            .trigger(trigger_alias)
            .and_then(|trigger| trigger.as_periodic().map(|periodic| (trigger, periodic)))
            .ok_or_else(|| EngineError::NotPeriodic {
                automation_alias: automation_alias.to_string(),
                trigger_alias: trigger_alias.to_string(),
            })?;

        let mut data = AutomationDataFactory::for_periodic(
            key.tenant_context(),
            periodic.time_zone_id.clone(),
            self.dependencies.clock.now(),
        );
        {
            let mut ctx = ProviderContext::new(&mut data, cancellation);
            if !trigger
                .run_condition_holds(&mut ctx)
                .await
                .map_err(ae_automation::AutomationError::from)?
            {
                debug!("Periodic trigger run condition is false");
                return Ok(None);
            }
            ctx.data.set_matched(&automation.alias, &trigger.alias);
            automation.execute(&mut ctx).await?;
        }
        Ok(Some(data))
    }

    // ==================== Background worker ====================

    /// Start the worker that runs asynchronous actions
    ///
    /// Every job runs in its own task, so a stalled action does not hold
    /// back the ones queued after it. Stopping the engine cancels running
    /// jobs and discards queued ones.
    pub fn start_worker(self: &Arc<Self>) -> EngineResult<JoinHandle<()>> {
        let mut receiver = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(EngineError::WorkerAlreadyStarted)?;
        let engine = Arc::clone(self);

        Ok(tokio::spawn(async move {
            info!("Background worker started");
            let mut running = JoinSet::new();
            loop {
                tokio::select! {
                    biased;
                    _ = engine.shutdown.cancelled() => break,
                    Some(job) = receiver.recv() => {
                        let engine = Arc::clone(&engine);
                        let cancellation = engine.shutdown.child_token();
                        running.spawn(async move {
                            engine.run_logged(job, cancellation).await;
                        });
                    }
                    Some(joined) = running.join_next(), if !running.is_empty() => {
                        if let Err(e) = joined {
                            warn!("Background action task failed: {}", e);
                        }
                    }
                }
            }

            while let Some(joined) = running.join_next().await {
                if let Err(e) = joined {
                    warn!("Background action task failed: {}", e);
                }
            }
            receiver.close();
            let mut discarded = 0;
            while receiver.try_recv().is_ok() {
                engine.pending.finished();
                discarded += 1;
            }
            if discarded > 0 {
                warn!(discarded, "Discarded queued background actions");
            }
            info!("Background worker stopped");
        }))
    }

    async fn run_logged(&self, job: BackgroundActionJob, cancellation: CancellationToken) {
        let automation_alias = job.automation_alias.clone();
        let action = job.action.clone();
        if let Err(e) = self.run_job(job, cancellation).await {
            warn!(
                automation_alias = %automation_alias,
                action = %action,
                error = %e,
                "Background action failed"
            );
        }
        self.pending.finished();
    }

    /// Run one queued asynchronous action on its deserialized context
    #[instrument(skip_all, fields(automation_alias = %job.automation_alias, action = %job.action))]
    pub async fn run_job(
        &self,
        job: BackgroundActionJob,
        cancellation: CancellationToken,
    ) -> EngineResult<AutomationData> {
        let mut data = AutomationData::from_snapshot(&job.snapshot)?;
        let key = ReleaseKey::from(&data.system.tenant);
        let configuration = self.require(&key)?;
        let automation = configuration
            .automation(&job.automation_alias)
            .ok_or_else(|| EngineError::AutomationNotFound(job.automation_alias.clone()))?;
        {
            let mut ctx = ProviderContext::new(&mut data, cancellation);
            automation.execute_background(&job.action, &mut ctx).await?;
        }
        Ok(data)
    }

    /// Wait until every queued asynchronous action has run
    ///
    /// Only returns once the worker has drained the queue, so the worker
    /// must be started.
    pub async fn wait_idle(&self) {
        self.pending.wait_idle().await;
    }

    /// Asynchronous actions queued or running
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    /// Stop the event listener and the background worker
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Stopping automation engine");
        self.shutdown.cancel();
    }
}

/// Error payload as a JSON response carrying its status code
pub fn error_response(payload: &ErrorData) -> HttpResponseData {
    let status = if (100..=599).contains(&payload.http_status_code) {
        payload.http_status_code
    } else {
        500
    };
    HttpResponseData::json(
        status,
        serde_json::to_value(payload).unwrap_or(Value::Null),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;

    #[test]
    fn test_error_response_uses_payload_status() {
        let response = error_response(&ErrorData::trigger_not_found("GET /x"));
        assert_eq!(response.http_status_code, 404);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(
            response.content.unwrap()["code"],
            Value::from(codes::TRIGGER_NOT_FOUND)
        );
    }

    #[test]
    fn test_error_response_defaults_to_500() {
        let payload = ErrorData::new("x.y", "Broken", "Broken.", 0);
        assert_eq!(error_response(&payload).http_status_code, 500);
    }

    #[tokio::test]
    async fn test_worker_starts_once() {
        let engine = Arc::new(AutomationEngine::new(
            Arc::new(EventBus::new()),
            Dependencies::new(),
        ));
        let handle = engine.start_worker().unwrap();
        assert!(matches!(
            engine.start_worker(),
            Err(EngineError::WorkerAlreadyStarted)
        ));
        engine.stop();
        handle.await.unwrap();
    }
}
