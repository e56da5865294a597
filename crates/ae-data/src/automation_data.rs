//! The per-invocation execution context

use ae_core::pointer::{self, PathOutcome};
use ae_core::{ErrorData, TenantContext};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::action::{ActionData, ActionLocation, ActionScope};
use crate::error::{DataError, DataResult};
use crate::http::HttpResponseData;
use crate::trigger::TriggerData;

/// Identifiers of the invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    pub tenant: TenantContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_alias: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Domain entities attached for lookup convenience, read-only once set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<Value>,
}

/// Addressable state of one automation invocation
///
/// Sections are reachable by pointer: `/system`, `/context`, `/trigger`,
/// `/actions/{alias}`, `/variables/{name}` and `/error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationData {
    pub system: SystemData,

    #[serde(default)]
    pub context: ContextEntities,

    pub trigger: TriggerData,

    #[serde(default)]
    pub actions: IndexMap<String, ActionData>,

    #[serde(default)]
    pub variables: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl AutomationData {
    pub fn new(tenant: TenantContext, trigger: TriggerData, now: DateTime<Utc>) -> Self {
        Self {
            system: SystemData {
                tenant,
                automation_alias: None,
                trigger_alias: None,
                created_at: now,
            },
            context: ContextEntities::default(),
            trigger,
            actions: IndexMap::new(),
            variables: IndexMap::new(),
            error: None,
        }
    }

    /// Record which automation and trigger were selected
    pub fn set_matched(&mut self, automation_alias: &str, trigger_alias: &str) {
        self.system.automation_alias = Some(automation_alias.to_string());
        self.system.trigger_alias = Some(trigger_alias.to_string());
    }

    // ==================== Path lookup ====================

    /// Look up a path against the context
    ///
    /// Only the section the path addresses is serialized, so lookups stay
    /// cheap as the action map grows. Relative pointers can climb to the
    /// root and therefore see the whole document.
    pub fn lookup(
        &self,
        path: &str,
        context_pointer: Option<&str>,
    ) -> DataResult<PathOutcome<'static>> {
        if pointer::is_relative(path) || path.is_empty() {
            let root = self.to_value()?;
            return Ok(pointer::lookup_with_context(&root, path, context_pointer)?.into_owned());
        }

        let tokens = pointer::tokens(path)?;
        let root = self.partial_root(&tokens);
        trace!(path, "Looking up path in automation data");
        Ok(pointer::lookup(&root, path)?.into_owned())
    }

    /// Serialize the parts of the document a path starting with `tokens` can reach
    fn partial_root(&self, tokens: &[String]) -> Value {
        let mut root = Map::new();
        let Some(section) = tokens.first() else {
            return Value::Object(root);
        };
        let value = match section.as_str() {
            "system" => serde_json::to_value(&self.system).ok(),
            "context" => serde_json::to_value(&self.context).ok(),
            "trigger" => serde_json::to_value(&self.trigger).ok(),
            "variables" => serde_json::to_value(&self.variables).ok(),
            "error" => self.error.as_ref().and_then(|e| serde_json::to_value(e).ok()),
            "actions" => match tokens.get(1) {
                Some(alias) => {
                    let mut actions = Map::new();
                    if let Some(action) = self.actions.get(alias) {
                        if let Ok(v) = serde_json::to_value(action) {
                            actions.insert(alias.clone(), v);
                        }
                    }
                    Some(Value::Object(actions))
                }
                None => serde_json::to_value(&self.actions).ok(),
            },
            _ => None,
        };
        if let Some(value) = value {
            root.insert(section.clone(), value);
        }
        Value::Object(root)
    }

    /// The whole document as JSON, used as the data object of templates
    pub fn to_value(&self) -> DataResult<Value> {
        serde_json::to_value(self).map_err(DataError::Serialization)
    }

    // ==================== Actions ====================

    pub fn action(&self, location: &ActionLocation) -> Option<&ActionData> {
        let mut segments = location.segments().iter();
        let (_, first) = segments.next()?;
        let mut current = self.actions.get(first)?;
        for (scope, alias) in segments {
            current = current.container(scope)?.get(alias)?;
        }
        Some(current)
    }

    pub fn action_mut(&mut self, location: &ActionLocation) -> Option<&mut ActionData> {
        let mut segments = location.segments().iter();
        let (_, first) = segments.next()?;
        let mut current = self.actions.get_mut(first)?;
        for (scope, alias) in segments {
            current = current.container_mut(scope)?.get_mut(alias)?;
        }
        Some(current)
    }

    /// Insert (or replace) the record at `location`
    ///
    /// The containing record must already exist.
    pub fn insert_action(&mut self, location: &ActionLocation, data: ActionData) -> DataResult<()> {
        let alias = location.alias().to_string();
        match location.parent() {
            None => {
                self.actions.insert(alias, data);
                Ok(())
            }
            Some((parent, scope)) => {
                let scope: ActionScope = scope.clone();
                let parent_record = self
                    .action_mut(&parent)
                    .ok_or_else(|| DataError::ActionNotFound(parent.pointer()))?;
                let container = parent_record
                    .container_mut(&scope)
                    .ok_or_else(|| DataError::ContainerMissing(location.pointer()))?;
                container.insert(alias, data);
                Ok(())
            }
        }
    }

    // ==================== Variables ====================

    /// Set a variable by name or by a path below `/variables`
    ///
    /// `quote/total` and `/quote/total` both create intermediate objects as
    /// needed. A leading `/variables` is accepted and stripped.
    pub fn set_variable(&mut self, path: &str, value: Value) -> DataResult<()> {
        let trimmed = match path.strip_prefix("/variables") {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };
        let absolute = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        let tokens = pointer::tokens(&absolute)
            .map_err(|_| DataError::InvalidVariablePath(path.to_string()))?;
        let Some((name, rest)) = tokens.split_first() else {
            return Err(DataError::InvalidVariablePath(path.to_string()));
        };
        if name.is_empty() {
            return Err(DataError::InvalidVariablePath(path.to_string()));
        }

        if rest.is_empty() {
            self.variables.insert(name.clone(), value);
            return Ok(());
        }

        let mut current = self
            .variables
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let (last, middle) = rest
            .split_last()
            .ok_or_else(|| DataError::InvalidVariablePath(path.to_string()))?;
        for token in middle {
            current = child_mut(current, token)
                .ok_or_else(|| DataError::InvalidVariablePath(path.to_string()))?;
        }
        match current {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => match last.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    items[i] = value;
                    Ok(())
                }
                Ok(i) if i == items.len() => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(DataError::InvalidVariablePath(path.to_string())),
            },
            _ => Err(DataError::InvalidVariablePath(path.to_string())),
        }
    }

    // ==================== Trigger response and error ====================

    /// Response of an HTTP trigger, created on first use
    pub fn http_response_mut(&mut self) -> Option<&mut HttpResponseData> {
        self.trigger
            .as_http_mut()
            .map(|http| http.http_response.get_or_insert_with(HttpResponseData::default))
    }

    /// Record the error that aborted the automation; the first one wins
    pub fn set_error(&mut self, error: ErrorData) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    // ==================== Snapshots ====================

    /// Serialize for hand-off to background execution
    pub fn to_snapshot(&self) -> DataResult<String> {
        serde_json::to_string(self).map_err(DataError::Serialization)
    }

    pub fn from_snapshot(snapshot: &str) -> DataResult<Self> {
        serde_json::from_str(snapshot).map_err(DataError::Serialization)
    }
}

/// Step into `token` of a JSON container, creating objects for missing or
/// null entries
fn child_mut<'a>(value: &'a mut Value, token: &str) -> Option<&'a mut Value> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => {
            let entry = map
                .entry(token.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if entry.is_null() {
                *entry = Value::Object(Map::new());
            }
            Some(entry)
        }
        Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionDetail;
    use crate::http::HttpRequestData;
    use crate::trigger::HttpTriggerData;
    use ae_core::DeploymentEnvironment;
    use serde_json::json;

    fn data() -> AutomationData {
        let request = HttpRequestData::new("POST", "https://x.test/automations/addressMatch?full=1")
            .with_action_path("addressMatch")
            .with_content("application/json", json!({"postcode": "3000"}));
        AutomationData::new(
            TenantContext::new("acme", "motor", DeploymentEnvironment::Development),
            TriggerData::Http(HttpTriggerData::new(request)),
            Utc::now(),
        )
    }

    #[test]
    fn test_lookup_sections() {
        let mut data = data();
        data.variables.insert("limit".into(), json!(10));
        data.variables.insert("nothing".into(), Value::Null);

        assert_eq!(
            data.lookup("/trigger/httpRequest/content/postcode", None)
                .unwrap()
                .into_value(),
            Some(json!("3000"))
        );
        assert_eq!(
            data.lookup("/variables/limit", None).unwrap().into_value(),
            Some(json!(10))
        );
        assert_eq!(data.lookup("/variables/nothing", None).unwrap(), PathOutcome::Null);
        assert_eq!(data.lookup("/variables/missing", None).unwrap(), PathOutcome::NotFound);
        assert_eq!(data.lookup("/unknownSection", None).unwrap(), PathOutcome::NotFound);
        assert!(data.lookup("/variables/nothing/deeper", None).is_err());
    }

    #[test]
    fn test_lookup_action_and_relative() {
        let mut data = data();
        let loc = ActionLocation::root("lookup");
        data.insert_action(&loc, ActionData::new("Lookup", "lookup", ActionDetail::http_request()))
            .unwrap();

        assert_eq!(
            data.lookup("/actions/lookup/actionType", None).unwrap().into_value(),
            Some(json!("httpRequest"))
        );
        assert_eq!(
            data.lookup("0#", Some("/actions/lookup")).unwrap().into_value(),
            Some(json!("lookup"))
        );
        assert_eq!(
            data.lookup("1/lookup/alias", Some("/actions/lookup")).unwrap().into_value(),
            Some(json!("lookup"))
        );
    }

    #[test]
    fn test_nested_action_insert() {
        let mut data = data();
        let group = ActionLocation::root("group");
        data.insert_action(&group, ActionData::new("G", "group", ActionDetail::group()))
            .unwrap();
        let child = group.child(ActionScope::ChildActions, "child");
        data.insert_action(&child, ActionData::new("C", "child", ActionDetail::set_variable()))
            .unwrap();
        let recovery = child.child(ActionScope::OnErrorActions, "recover");
        data.insert_action(&recovery, ActionData::new("R", "recover", ActionDetail::raise_event()))
            .unwrap();

        assert!(data.action(&recovery).is_some());
        assert_eq!(
            data.lookup("/actions/group/childActions/child/onErrorActions/recover/name", None)
                .unwrap()
                .into_value(),
            Some(json!("R"))
        );

        let missing = ActionLocation::root("nope").child(ActionScope::ChildActions, "x");
        assert!(matches!(
            data.insert_action(&missing, ActionData::new("X", "x", ActionDetail::group())),
            Err(DataError::ActionNotFound(_))
        ));
    }

    #[test]
    fn test_set_variable_paths() {
        let mut data = data();
        data.set_variable("total", json!(1)).unwrap();
        data.set_variable("/quote/premium/base", json!(100)).unwrap();
        data.set_variable("/variables/quote/premium/tax", json!(10)).unwrap();
        data.set_variable("list", json!([1])).unwrap();
        data.set_variable("list/1", json!(2)).unwrap();

        assert_eq!(data.variables["total"], json!(1));
        assert_eq!(data.variables["quote"], json!({"premium": {"base": 100, "tax": 10}}));
        assert_eq!(data.variables["list"], json!([1, 2]));
        assert!(data.set_variable("total/deeper", json!(1)).is_err());
        assert!(data.set_variable("", json!(1)).is_err());
    }

    #[test]
    fn test_first_error_wins() {
        let mut data = data();
        data.set_error(ErrorData::engine_error("first"));
        data.set_error(ErrorData::engine_error("second"));
        assert_eq!(data.error.unwrap().message, "first");
    }
}
