//! Automations
//!
//! An automation ties together triggers, an optional run condition and an
//! action tree. It is compiled once per configuration version and executed
//! once per matched invocation.

use ae_data::{ActionLocation, ActionScope, DataError, HttpResponseData};
use ae_providers::parse::{as_array, as_object, optional_str, required, required_str, BuildResult};
use ae_providers::{BoxedProvider, Dependencies, ProviderBuilder, ProviderContext};
use ae_script::{error_condition, parse_actions, Action, ActionBuilder, ActionExecutor};
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{duplicate_alias, first_duplicate, AliasKind, AutomationError, AutomationResult};
use crate::trigger::{Trigger, TriggerBuilder};

const KIND: &str = "automation";

/// Parsed automation configuration
#[derive(Debug, Clone)]
pub struct AutomationBuilder {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<ProviderBuilder>,
    pub triggers: Vec<TriggerBuilder>,
    pub actions: Vec<ActionBuilder>,
}

impl AutomationBuilder {
    pub fn parse(value: &Value) -> BuildResult<Self> {
        let object = as_object(value, KIND)?;
        let alias = required_str(object, "alias", KIND)?.to_string();
        let parse = || -> BuildResult<Self> {
            Ok(Self {
                name: required_str(object, "name", KIND)?.to_string(),
                alias: alias.clone(),
                description: optional_str(object, "description", KIND)?.map(str::to_string),
                run_condition: ProviderBuilder::parse_optional(object, "runCondition")?,
                triggers: as_array(required(object, "triggers", KIND)?, "triggers")?
                    .iter()
                    .map(TriggerBuilder::parse)
                    .collect::<BuildResult<_>>()?,
                actions: match object.get("actions") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(actions) => parse_actions(actions)?,
                },
            })
        };
        parse().map_err(|e| e.with_detail(format!("Automation alias: {}", alias)))
    }

    /// Trigger aliases, then action aliases across the whole action tree,
    /// must be pairwise distinct
    pub fn validate(&self) -> BuildResult<()> {
        if let Some(alias) = first_duplicate(self.triggers.iter().map(|t| t.alias.as_str())) {
            return Err(duplicate_alias(AliasKind::Trigger, alias)
                .with_detail(format!("Automation alias: {}", self.alias)));
        }
        let actions = self.actions.iter().flat_map(ActionBuilder::aliases);
        if let Some(alias) = first_duplicate(actions) {
            return Err(duplicate_alias(AliasKind::Action, alias)
                .with_detail(format!("Automation alias: {}", self.alias)));
        }
        Ok(())
    }

    pub fn build(&self, deps: &Dependencies) -> Automation {
        Automation {
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            run_condition: self.run_condition.as_ref().map(|c| c.build(deps)),
            triggers: self.triggers.iter().map(|t| t.build(deps)).collect(),
            actions: self.actions.iter().map(|a| a.build(deps)).collect(),
            executor: ActionExecutor::new(deps),
        }
    }
}

/// A compiled automation
#[derive(Debug, Clone)]
pub struct Automation {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<BoxedProvider>,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
    executor: ActionExecutor,
}

impl Automation {
    pub fn trigger(&self, alias: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.alias == alias)
    }

    /// First trigger that matches the invocation and whose run condition holds
    ///
    /// On a match the context records the automation and trigger aliases
    /// and, for HTTP triggers, the captured path parameters.
    pub async fn select_trigger(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<Option<&Trigger>> {
        for trigger in &self.triggers {
            let Some(parameters) = trigger.structural_match(&ctx.data.trigger) else {
                continue;
            };
            if let Some(http) = ctx.data.trigger.as_http_mut() {
                http.path_parameters = parameters;
            }
            if trigger.run_condition_holds(ctx).await? {
                ctx.data.set_matched(&self.alias, &trigger.alias);
                debug!(
                    automation_alias = %self.alias,
                    trigger_alias = %trigger.alias,
                    "Trigger selected"
                );
                return Ok(Some(trigger));
            }
            trace!(trigger_alias = %trigger.alias, "Trigger run condition is false");
        }
        if let Some(http) = ctx.data.trigger.as_http_mut() {
            http.path_parameters.clear();
        }
        Ok(None)
    }

    /// Run the automation for the trigger recorded in the context
    ///
    /// An unhandled error is recorded at `/error` and returned. The HTTP
    /// trigger's response is rendered whenever no error occurred, including
    /// when the automation run condition stopped every action.
    #[instrument(skip_all, fields(automation_alias = %self.alias))]
    pub async fn execute(&self, ctx: &mut ProviderContext<'_>) -> AutomationResult<()> {
        let trigger = ctx
            .data
            .system
            .trigger_alias
            .as_deref()
            .and_then(|alias| self.trigger(alias));

        let outcome = match self.run(trigger, ctx).await {
            Ok(()) => self.render_response(trigger, ctx).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                info!("Automation completed");
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                info!("Automation cancelled");
                Err(e)
            }
            Err(e) => {
                let payload = e.error_data();
                warn!(code = %payload.code, "Automation failed: {}", payload.message);
                ctx.data.set_error(payload);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        trigger: Option<&Trigger>,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<()> {
        if let Some(http) = trigger.and_then(Trigger::as_http) {
            if let Some(error) =
                error_condition::first_match(&http.request_validation_errors, ctx).await?
            {
                debug!(code = %error.code, "Request rejected by validation error");
                return Err(AutomationError::RequestRejected(error));
            }
        }

        if let Some(condition) = &self.run_condition {
            if !ctx.resolve_bool(condition.as_ref()).await? {
                info!("Automation run condition is false, no actions run");
                return Ok(());
            }
        }

        self.executor
            .execute_all(&self.actions, None, ActionScope::Actions, ctx)
            .await?;
        Ok(())
    }

    async fn render_response(
        &self,
        trigger: Option<&Trigger>,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<()> {
        let Some(http) = trigger.and_then(Trigger::as_http) else {
            return Ok(());
        };
        let response = match &http.http_response {
            Some(template) => template.render(ctx).await?,
            None => HttpResponseData::default(),
        };
        if let Some(slot) = ctx.data.http_response_mut() {
            *slot = response;
        }
        Ok(())
    }

    /// Run one asynchronous action on a copy of the context it was queued with
    pub async fn execute_background(
        &self,
        location: &ActionLocation,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<()> {
        let action = Action::locate(&self.actions, location)
            .ok_or_else(|| DataError::ActionNotFound(location.pointer()))?;

        // Actions queued from inside an iteration still see their item
        if let Some((parent, ActionScope::Iteration(index))) = location.parent() {
            ctx.path_context = Some(format!("{}/iterations/{}/item", parent.pointer(), index));
        }

        info!(automation_alias = %self.alias, location = %location, "Running background action");
        if let Err(e) = self.executor.execute_inline(action, location.clone(), ctx).await {
            let e = AutomationError::from(e);
            if !e.is_cancelled() {
                ctx.data.set_error(e.error_data());
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;
    use serde_json::json;

    fn set(alias: &str) -> Value {
        json!({"setVariableAction": {"name": alias, "alias": alias, "variableName": alias, "value": 1}})
    }

    fn http(alias: &str) -> Value {
        json!({"httpTrigger": {"name": alias, "alias": alias,
            "endpoint": {"path": "quotes", "httpVerb": "POST"}}})
    }

    #[test]
    fn test_parse_automation() {
        let builder = AutomationBuilder::parse(&json!({
            "name": "Quotes", "alias": "quotes",
            "triggers": [http("onQuote")],
            "actions": [set("a"), set("b")]
        }))
        .unwrap();
        assert_eq!(builder.triggers.len(), 1);
        assert_eq!(builder.actions.len(), 2);
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_parse_errors_name_the_automation() {
        let err = AutomationBuilder::parse(&json!({"name": "Quotes", "alias": "quotes"}))
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);
        assert!(err
            .additional_details
            .contains(&"Automation alias: quotes".to_string()));
    }

    #[test]
    fn test_duplicate_trigger_alias() {
        let builder = AutomationBuilder::parse(&json!({
            "name": "Quotes", "alias": "quotes",
            "triggers": [http("same"), http("same")],
            "actions": []
        }))
        .unwrap();
        let err = builder.validate().unwrap_err();
        assert_eq!(err.code, codes::DISTINCT_TRIGGER_ALIAS);
    }

    #[test]
    fn test_duplicate_nested_action_alias() {
        let builder = AutomationBuilder::parse(&json!({
            "name": "Quotes", "alias": "quotes",
            "triggers": [http("onQuote")],
            "actions": [
                set("a"),
                {"groupAction": {"name": "g", "alias": "g", "actions": [set("a")]}}
            ]
        }))
        .unwrap();
        let err = builder.validate().unwrap_err();
        assert_eq!(err.code, codes::DISTINCT_ACTION_ALIAS);
        assert!(err.additional_details.contains(&"Alias: a".to_string()));
    }
}
