//! Action executor
//!
//! Walks an action tree against the execution context. For each action:
//!
//! 1. Record it as started.
//! 2. Evaluate the run condition; when false the action is skipped and
//!    nothing else about it is evaluated.
//! 3. Evaluate the before-run error conditions, first match wins.
//! 4. Run the action's effect.
//! 5. Evaluate the after-run error conditions, first match wins.
//! 6. On any error, run the error-recovery actions if configured; otherwise
//!    the error propagates and aborts the enclosing action list.
//! 7. Record it as finished.

use std::sync::Arc;

use ae_core::{codes, ErrorData, Event, EventOrigin};
use ae_data::{
    ActionData, ActionDetail, ActionLocation, ActionScope, AutomationData, DataError, EmailData,
    HttpRequestData, IterationData,
};
use ae_providers::{
    BackgroundActionJob, BoxedProvider, Clock, Dependencies, JobQueue, ProviderContext,
    ProviderError,
};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::action::{
    Action, ActionKind, HttpRequestAction, IterateAction, RaiseEventAction, SendEmailAction,
    SetVariableAction,
};
use crate::error::{ActionError, ActionResult};
use crate::error_condition;

/// Executes compiled actions
#[derive(Clone)]
pub struct ActionExecutor {
    clock: Arc<dyn Clock>,
    jobs: Arc<dyn JobQueue>,
}

impl ActionExecutor {
    pub fn new(deps: &Dependencies) -> Self {
        Self {
            clock: deps.clock.clone(),
            jobs: deps.jobs.clone(),
        }
    }

    /// Execute a list of actions in declared order
    ///
    /// `parent` is the record the list belongs to; `None` for the top-level
    /// `actions` of an automation. The first unhandled error stops the list.
    pub fn execute_all<'a>(
        &'a self,
        actions: &'a [Action],
        parent: Option<&'a ActionLocation>,
        scope: ActionScope,
        ctx: &'a mut ProviderContext<'_>,
    ) -> BoxFuture<'a, ActionResult<()>> {
        Box::pin(async move {
            for action in actions {
                let location = match parent {
                    Some(parent) => parent.child(scope.clone(), &action.alias),
                    None => ActionLocation::root(&action.alias),
                };
                self.execute(action, location, ctx, false).await?;
            }
            Ok(())
        })
    }

    /// Execute one action, honouring `runAsynchronously`
    pub fn execute_action<'a>(
        &'a self,
        action: &'a Action,
        location: ActionLocation,
        ctx: &'a mut ProviderContext<'_>,
    ) -> BoxFuture<'a, ActionResult<()>> {
        self.execute(action, location, ctx, false)
    }

    /// Execute one action in place, ignoring `runAsynchronously`
    ///
    /// Used by the background facility on its own copy of the context.
    pub fn execute_inline<'a>(
        &'a self,
        action: &'a Action,
        location: ActionLocation,
        ctx: &'a mut ProviderContext<'_>,
    ) -> BoxFuture<'a, ActionResult<()>> {
        self.execute(action, location, ctx, true)
    }

    fn execute<'a>(
        &'a self,
        action: &'a Action,
        location: ActionLocation,
        ctx: &'a mut ProviderContext<'_>,
        inline: bool,
    ) -> BoxFuture<'a, ActionResult<()>> {
        Box::pin(async move {
            ctx.check_cancelled()?;

            let mut record = ActionData::new(&action.name, &action.alias, action.initial_detail());
            record.run_asynchronously = action.run_asynchronously;
            record.start(self.clock.now());
            ctx.data.insert_action(&location, record)?;

            if action.run_asynchronously && !inline {
                return match self.enqueue(&location, ctx).await {
                    Ok(()) => Ok(()),
                    Err(e) => self.conclude(action, &location, ctx, Err(e)).await,
                };
            }

            debug!(action_alias = %action.alias, location = %location, "Executing action");

            if let Some(run_condition) = &action.run_condition {
                match ctx.resolve_bool(run_condition.as_ref()).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(action_alias = %action.alias, "Run condition is false, skipping action");
                        record_mut(ctx.data, &location)?.skip(self.clock.now());
                        return Ok(());
                    }
                    Err(e) => {
                        return self
                            .conclude(action, &location, ctx, Err(e.into()))
                            .await
                    }
                }
            }
            record_mut(ctx.data, &location)?.mark_ran();

            let outcome = self.run_checked(action, &location, ctx).await;
            self.conclude(action, &location, ctx, outcome).await
        })
    }

    async fn run_checked(
        &self,
        action: &Action,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        error_condition::check(&action.before_run_error_conditions, ctx).await?;
        self.run_effect(action, location, ctx).await?;
        error_condition::check(&action.after_run_error_conditions, ctx).await
    }

    /// Record the outcome and apply error recovery
    async fn conclude(
        &self,
        action: &Action,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
        outcome: ActionResult<()>,
    ) -> ActionResult<()> {
        let error = match outcome {
            Ok(()) => {
                record_mut(ctx.data, location)?.finish(self.clock.now(), false);
                return Ok(());
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => e,
        };

        let payload = error.error_data();
        record_mut(ctx.data, location)?.fail(payload.clone());

        if action.on_error_actions.is_empty() {
            warn!(
                action_alias = %action.alias,
                code = %payload.code,
                "Action failed: {}",
                payload.message
            );
            record_mut(ctx.data, location)?.finish(self.clock.now(), false);
            return Err(error);
        }

        debug!(
            action_alias = %action.alias,
            code = %payload.code,
            "Action failed, running error-recovery actions"
        );
        let recovered = self
            .execute_all(
                &action.on_error_actions,
                Some(location),
                ActionScope::OnErrorActions,
                ctx,
            )
            .await;
        if matches!(&recovered, Err(e) if e.is_cancelled()) {
            return recovered;
        }
        record_mut(ctx.data, location)?.finish(self.clock.now(), recovered.is_ok());
        recovered
    }

    async fn enqueue(&self, location: &ActionLocation, ctx: &mut ProviderContext<'_>) -> ActionResult<()> {
        let automation_alias = ctx.data.system.automation_alias.clone().unwrap_or_default();
        let job = BackgroundActionJob {
            automation_alias,
            action: location.clone(),
            snapshot: ctx.data.to_snapshot()?,
        };
        self.jobs.enqueue(job).await.map_err(ActionError::Capability)?;
        info!(location = %location, "Queued action for background execution");
        Ok(())
    }

    // ==================== Effects ====================

    async fn run_effect(
        &self,
        action: &Action,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        match &action.kind {
            ActionKind::HttpRequest(http) => self.http_request(http, location, ctx).await,
            ActionKind::SetVariable(set) => self.set_variable(set, location, ctx).await,
            ActionKind::RaiseEvent(raise) => self.raise_event(raise, location, ctx).await,
            ActionKind::Group(actions) => {
                self.execute_all(actions, Some(location), ActionScope::ChildActions, ctx)
                    .await
            }
            ActionKind::Iterate(iterate) => self.iterate(iterate, location, ctx).await,
            ActionKind::SendEmail(email) => self.send_email(email, location, ctx).await,
            ActionKind::RaiseError(error) => Err(ActionError::Raised(error.clone())),
        }
    }

    async fn http_request(
        &self,
        http: &HttpRequestAction,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let verb = ctx.resolve_text(http.http_verb.as_ref()).await?;
        let url = ctx.resolve_text(http.url.as_ref()).await?;
        let mut request = HttpRequestData::new(&verb, url.clone());
        for (name, value) in &http.headers {
            if let Some(value) = ctx.resolve_optional_text(value.as_ref()).await? {
                request = request.with_header(name.clone(), value);
            }
        }
        if let Some(content) = &http.content {
            let content = ctx.resolve(content.as_ref()).await?;
            let content_type = match &http.content_type {
                Some(content_type) => ctx.resolve_text(content_type.as_ref()).await?,
                None => "application/json".to_string(),
            };
            request = request.with_content(content_type, content);
        }

        if let ActionDetail::HttpRequest { http_request, .. } =
            &mut record_mut(ctx.data, location)?.detail
        {
            *http_request = Some(request.clone());
        }

        debug!(verb = %request.http_verb, url = %url, "Sending HTTP request");
        let response = http.client.send(request, &ctx.cancellation).await;
        ctx.check_cancelled()?;
        let response = response.map_err(|e| {
            ActionError::Capability(
                ErrorData::new(codes::ACTION_HTTP_FAILED, "HTTP request failed", e.message, 502)
                    .with_details(e.additional_details)
                    .with_detail(format!("URL: {}", url)),
            )
        })?;
        debug!(status = response.http_status_code, url = %url, "HTTP request completed");

        if let ActionDetail::HttpRequest { http_response, .. } =
            &mut record_mut(ctx.data, location)?.detail
        {
            *http_response = Some(response);
        }
        Ok(())
    }

    async fn set_variable(
        &self,
        set: &SetVariableAction,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let value = ctx.resolve(set.value.as_ref()).await?;
        ctx.data.set_variable(&set.path, value.clone())?;
        record_mut(ctx.data, location)?.detail = ActionDetail::SetVariable {
            variable_path: Some(set.path.clone()),
            value: Some(value),
        };
        Ok(())
    }

    async fn raise_event(
        &self,
        raise: &RaiseEventAction,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let event_type = ctx.resolve_text(raise.event_type.as_ref()).await?;
        let custom_event_alias = match &raise.custom_event_alias {
            Some(alias) => ctx.resolve_optional_text(alias.as_ref()).await?,
            None => None,
        };
        let event_data = match &raise.event_data {
            Some(data) => ctx.resolve(data.as_ref()).await?,
            None => Value::Null,
        };

        let mut event = Event::new(
            event_type.as_str(),
            event_data.clone(),
            ctx.data.system.tenant.child(),
        )
        .with_origin(EventOrigin::Automation);
        event.custom_event_alias = custom_event_alias.clone();
        event.time_fired = self.clock.now();

        record_mut(ctx.data, location)?.detail = ActionDetail::RaiseEvent {
            event_type: Some(event_type.clone()),
            custom_event_alias,
            event_data: Some(event_data),
        };

        raise
            .events
            .publish(event)
            .await
            .map_err(ActionError::Capability)?;
        debug!(%event_type, "Raised event");
        Ok(())
    }

    async fn iterate(
        &self,
        iterate: &IterateAction,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let items = match ctx.resolve(iterate.list.as_ref()).await? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => return Err(ProviderError::invalid_type("iterate list", "list", &other).into()),
        };

        let saved_context = ctx.path_context.take();
        let outcome = self.iterate_items(iterate, items, location, ctx).await;
        ctx.path_context = saved_context;
        outcome
    }

    async fn iterate_items(
        &self,
        iterate: &IterateAction,
        items: Vec<Value>,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let base = location.pointer();
        for (index, item) in items.into_iter().enumerate() {
            if let ActionDetail::Iterate {
                current_item,
                current_index,
                iterations,
            } = &mut record_mut(ctx.data, location)?.detail
            {
                *current_item = Some(item.clone());
                *current_index = Some(index);
                iterations.push(IterationData {
                    index,
                    item,
                    actions: Default::default(),
                });
            }
            ctx.path_context = Some(format!("{}/iterations/{}/item", base, index));
            self.execute_all(
                &iterate.actions,
                Some(location),
                ActionScope::Iteration(index),
                ctx,
            )
            .await?;
        }
        Ok(())
    }

    async fn send_email(
        &self,
        email: &SendEmailAction,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> ActionResult<()> {
        let message = EmailData {
            from: ctx.resolve_text(email.from.as_ref()).await?,
            to: addresses(ctx, Some(&email.to)).await?,
            cc: addresses(ctx, email.cc.as_ref()).await?,
            bcc: addresses(ctx, email.bcc.as_ref()).await?,
            subject: ctx.resolve_text(email.subject.as_ref()).await?,
            text_body: optional_text(ctx, email.text_body.as_ref()).await?,
            html_body: optional_text(ctx, email.html_body.as_ref()).await?,
        };
        record_mut(ctx.data, location)?.detail = ActionDetail::SendEmail {
            email: Some(message.clone()),
        };
        email
            .sender
            .send(message)
            .await
            .map_err(ActionError::Capability)
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor").finish_non_exhaustive()
    }
}

fn record_mut<'c>(
    data: &'c mut AutomationData,
    location: &ActionLocation,
) -> ActionResult<&'c mut ActionData> {
    data.action_mut(location)
        .ok_or_else(|| DataError::ActionNotFound(location.pointer()).into())
}

async fn optional_text(
    ctx: &mut ProviderContext<'_>,
    provider: Option<&BoxedProvider>,
) -> ActionResult<Option<String>> {
    match provider {
        Some(provider) => Ok(ctx.resolve_optional_text(provider.as_ref()).await?),
        None => Ok(None),
    }
}

/// One address or a list of addresses
async fn addresses(
    ctx: &mut ProviderContext<'_>,
    provider: Option<&BoxedProvider>,
) -> ActionResult<Vec<String>> {
    let Some(provider) = provider else {
        return Ok(Vec::new());
    };
    match ctx.resolve(provider.as_ref()).await? {
        Value::Null => Ok(Vec::new()),
        Value::String(address) => Ok(vec![address]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(address) => Ok(address),
                other => Err(ActionError::from(ProviderError::invalid_type(
                    "address", "text", &other,
                ))),
            })
            .collect(),
        other => Err(ProviderError::invalid_type("addresses", "list", &other).into()),
    }
}
