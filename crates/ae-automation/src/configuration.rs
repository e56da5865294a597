//! Automation configurations
//!
//! One configuration is the validated, compiled form of an automation
//! document for a single release. It is immutable after build and shared by
//! every invocation.

use ae_config::{AutomationDocument, SchemaVersion};
use ae_providers::{Dependencies, ProviderContext};
use serde_json::Value;
use tracing::{debug, info};

use crate::automation::{Automation, AutomationBuilder};
use crate::error::{duplicate_alias, first_duplicate, AliasKind, AutomationError, AutomationResult};
use crate::trigger::{PeriodicTrigger, Trigger};

/// Parsed, not yet compiled, configuration
#[derive(Debug, Clone)]
pub struct AutomationsConfigurationBuilder {
    pub schema_version: SchemaVersion,
    pub automations: Vec<AutomationBuilder>,
}

impl AutomationsConfigurationBuilder {
    /// Parse a loaded document
    pub fn parse(value: Value) -> AutomationResult<Self> {
        let document = AutomationDocument::from_value(value)
            .map_err(|e| AutomationError::Configuration(e.to_error_data()))?;
        Self::from_document(document)
    }

    pub fn from_document(document: AutomationDocument) -> AutomationResult<Self> {
        let automations = document
            .automations
            .iter()
            .map(AutomationBuilder::parse)
            .collect::<Result<_, _>>()
            .map_err(AutomationError::Configuration)?;
        Ok(Self {
            schema_version: document.schema_version,
            automations,
        })
    }

    /// Check every alias invariant before anything is compiled
    pub fn validate(&self) -> AutomationResult<()> {
        if let Some(alias) = first_duplicate(self.automations.iter().map(|a| a.alias.as_str())) {
            return Err(AutomationError::Configuration(duplicate_alias(
                AliasKind::Automation,
                alias,
            )));
        }
        for automation in &self.automations {
            automation.validate().map_err(AutomationError::Configuration)?;
        }
        Ok(())
    }

    pub fn build(&self, deps: &Dependencies) -> AutomationsConfiguration {
        AutomationsConfiguration {
            schema_version: self.schema_version,
            automations: self.automations.iter().map(|a| a.build(deps)).collect(),
        }
    }
}

/// A compiled configuration
#[derive(Debug, Clone)]
pub struct AutomationsConfiguration {
    pub schema_version: SchemaVersion,
    automations: Vec<Automation>,
}

impl AutomationsConfiguration {
    /// Parse, validate and compile a document
    pub fn load(value: Value, deps: &Dependencies) -> AutomationResult<Self> {
        let builder = AutomationsConfigurationBuilder::parse(value)?;
        builder.validate()?;
        let configuration = builder.build(deps);
        info!(
            schema_version = %configuration.schema_version,
            automations = configuration.automations.len(),
            "Loaded automation configuration"
        );
        Ok(configuration)
    }

    pub fn automations(&self) -> &[Automation] {
        &self.automations
    }

    pub fn automation(&self, alias: &str) -> Option<&Automation> {
        self.automations.iter().find(|a| a.alias == alias)
    }

    /// First automation, in declaration order, with a selectable trigger
    pub async fn select(
        &self,
        ctx: &mut ProviderContext<'_>,
    ) -> AutomationResult<Option<&Automation>> {
        for automation in &self.automations {
            if automation.select_trigger(ctx).await?.is_some() {
                return Ok(Some(automation));
            }
        }
        debug!(trigger_type = ctx.data.trigger.kind(), "No trigger matched");
        Ok(None)
    }

    /// Every periodic trigger with the automation that owns it
    pub fn periodic_triggers(
        &self,
    ) -> impl Iterator<Item = (&Automation, &Trigger, &PeriodicTrigger)> {
        self.automations.iter().flat_map(|automation| {
            automation.triggers.iter().filter_map(move |trigger| {
                trigger
                    .as_periodic()
                    .map(|periodic| (automation, trigger, periodic))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;
    use serde_json::json;

    fn automation(alias: &str) -> Value {
        json!({"name": alias, "alias": alias, "triggers": [
            {"periodicTrigger": {"name": "p", "alias": "p", "recurrence": {"minute": "*/5"}}}
        ], "actions": []})
    }

    #[test]
    fn test_load_document() {
        let configuration = AutomationsConfiguration::load(
            json!({"schemaVersion": "1.0.0", "automations": [automation("a"), automation("b")]}),
            &Dependencies::new(),
        )
        .unwrap();
        assert_eq!(configuration.automations().len(), 2);
        assert!(configuration.automation("b").is_some());

        let periodic: Vec<_> = configuration
            .periodic_triggers()
            .map(|(a, t, p)| (a.alias.clone(), t.alias.clone(), p.recurrence.cron_expression()))
            .collect();
        assert_eq!(periodic[0], ("a".to_string(), "p".to_string(), "*/5 * * * *".to_string()));
    }

    #[test]
    fn test_duplicate_automation_alias() {
        let err = AutomationsConfiguration::load(
            json!({"schemaVersion": "1.0.0", "automations": [automation("a"), automation("a")]}),
            &Dependencies::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_data().code, codes::DISTINCT_AUTOMATION_ALIAS);
    }

    #[test]
    fn test_unsupported_schema_version() {
        let err = AutomationsConfiguration::load(
            json!({"schemaVersion": "2.0.0", "automations": []}),
            &Dependencies::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_data().code, codes::UNSUPPORTED_SCHEMA_VERSION);
    }
}
