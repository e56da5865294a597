//! Execution records for actions
//!
//! One [`ActionData`] exists per executed action instance, including each
//! child of a group, each action of each iteration and each error-recovery
//! action. Records nest the same way actions do, so every record has a stable
//! address in the execution context (see [`ActionLocation`]).

use ae_core::{pointer, ErrorData};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{HttpRequestData, HttpResponseData};

/// Lifecycle state of an action
///
/// `NotStarted -> Started -> Skipped` when the run condition is false,
/// otherwise `NotStarted -> Started -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionState {
    #[default]
    NotStarted,
    Started,
    Skipped,
    Succeeded,
    Failed,
}

/// Execution record of a single action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    pub name: String,
    pub alias: String,
    pub state: ActionState,

    /// The run condition allowed the action to run
    pub ran: bool,

    /// No unhandled error occurred
    pub succeeded: bool,

    /// Set on every terminal path
    pub finished: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Queued for background execution instead of running inline
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub run_asynchronously: bool,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub on_error_actions: IndexMap<String, ActionData>,

    #[serde(flatten)]
    pub detail: ActionDetail,
}

/// Kind-specific part of an action record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "camelCase")]
pub enum ActionDetail {
    #[serde(rename_all = "camelCase")]
    HttpRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_request: Option<HttpRequestData>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_response: Option<HttpResponseData>,
    },
    #[serde(rename_all = "camelCase")]
    SetVariable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    RaiseEvent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_event_alias: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_data: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Group {
        #[serde(default)]
        child_actions: IndexMap<String, ActionData>,
    },
    #[serde(rename_all = "camelCase")]
    Iterate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_item: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_index: Option<usize>,
        #[serde(default)]
        iterations: Vec<IterationData>,
    },
    #[serde(rename_all = "camelCase")]
    SendEmail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<EmailData>,
    },
    RaiseError,
}

impl ActionDetail {
    pub fn http_request() -> Self {
        ActionDetail::HttpRequest {
            http_request: None,
            http_response: None,
        }
    }

    pub fn set_variable() -> Self {
        ActionDetail::SetVariable {
            variable_path: None,
            value: None,
        }
    }

    pub fn raise_event() -> Self {
        ActionDetail::RaiseEvent {
            event_type: None,
            custom_event_alias: None,
            event_data: None,
        }
    }

    pub fn group() -> Self {
        ActionDetail::Group {
            child_actions: IndexMap::new(),
        }
    }

    pub fn iterate() -> Self {
        ActionDetail::Iterate {
            current_item: None,
            current_index: None,
            iterations: Vec::new(),
        }
    }

    pub fn send_email() -> Self {
        ActionDetail::SendEmail { email: None }
    }
}

/// Record of one pass of an iterate action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationData {
    pub index: usize,
    pub item: Value,
    #[serde(default)]
    pub actions: IndexMap<String, ActionData>,
}

/// An email as handed to the email capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailData {
    pub from: String,
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

impl ActionData {
    pub fn new(name: impl Into<String>, alias: impl Into<String>, detail: ActionDetail) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            state: ActionState::NotStarted,
            ran: false,
            succeeded: false,
            finished: false,
            error: None,
            started_at: None,
            finished_at: None,
            run_asynchronously: false,
            on_error_actions: IndexMap::new(),
            detail,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.state = ActionState::Started;
        self.started_at = Some(now);
    }

    /// The run condition was false: nothing else happens to this action
    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.state = ActionState::Skipped;
        self.ran = false;
        self.finished = true;
        self.finished_at = Some(now);
    }

    pub fn mark_ran(&mut self) {
        self.ran = true;
    }

    /// Record an error; the action ends in `Failed`
    pub fn fail(&mut self, error: ErrorData) {
        self.state = ActionState::Failed;
        self.error = Some(error);
    }

    /// Terminal transition for every path other than a skip
    ///
    /// `handled` is true when an error was recorded but recovered by the
    /// action's error-recovery actions.
    pub fn finish(&mut self, now: DateTime<Utc>, handled: bool) {
        if self.error.is_none() {
            self.state = ActionState::Succeeded;
            self.succeeded = true;
        } else {
            self.succeeded = handled;
        }
        self.finished = true;
        self.finished_at = Some(now);
    }

    pub fn is_skipped(&self) -> bool {
        self.state == ActionState::Skipped
    }

    /// Nested record map for `scope`, created on demand for iterations
    pub fn container_mut(
        &mut self,
        scope: &ActionScope,
    ) -> Option<&mut IndexMap<String, ActionData>> {
        match (scope, &mut self.detail) {
            (ActionScope::OnErrorActions, _) => Some(&mut self.on_error_actions),
            (ActionScope::ChildActions, ActionDetail::Group { child_actions }) => {
                Some(child_actions)
            }
            (ActionScope::Iteration(index), ActionDetail::Iterate { iterations, .. }) => {
                iterations
                    .iter_mut()
                    .find(|i| i.index == *index)
                    .map(|i| &mut i.actions)
            }
            _ => None,
        }
    }

    pub fn container(&self, scope: &ActionScope) -> Option<&IndexMap<String, ActionData>> {
        match (scope, &self.detail) {
            (ActionScope::OnErrorActions, _) => Some(&self.on_error_actions),
            (ActionScope::ChildActions, ActionDetail::Group { child_actions }) => {
                Some(child_actions)
            }
            (ActionScope::Iteration(index), ActionDetail::Iterate { iterations, .. }) => {
                iterations
                    .iter()
                    .find(|i| i.index == *index)
                    .map(|i| &i.actions)
            }
            _ => None,
        }
    }
}

/// Which record map an action lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionScope {
    /// Top-level `actions` map of the execution context
    Actions,
    /// `childActions` of a group
    ChildActions,
    /// `onErrorActions` of any action
    OnErrorActions,
    /// `actions` of one iteration of an iterate action
    Iteration(usize),
}

/// Address of an action record inside the execution context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLocation {
    segments: Vec<(ActionScope, String)>,
}

impl ActionLocation {
    /// A top-level action
    pub fn root(alias: impl Into<String>) -> Self {
        Self {
            segments: vec![(ActionScope::Actions, alias.into())],
        }
    }

    /// An action nested in `scope` of this one
    pub fn child(&self, scope: ActionScope, alias: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push((scope, alias.into()));
        Self { segments }
    }

    /// The location of the record that contains this one
    pub fn parent(&self) -> Option<(ActionLocation, &ActionScope)> {
        if self.segments.len() < 2 {
            return None;
        }
        let (last, rest) = self.segments.split_last()?;
        Some((
            ActionLocation {
                segments: rest.to_vec(),
            },
            &last.0,
        ))
    }

    pub fn alias(&self) -> &str {
        self.segments
            .last()
            .map(|(_, alias)| alias.as_str())
            .unwrap_or_default()
    }

    pub fn segments(&self) -> &[(ActionScope, String)] {
        &self.segments
    }

    /// Pointer to the record, e.g. `/actions/group/childActions/child`
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for (scope, alias) in &self.segments {
            match scope {
                ActionScope::Actions => out.push_str("/actions"),
                ActionScope::ChildActions => out.push_str("/childActions"),
                ActionScope::OnErrorActions => out.push_str("/onErrorActions"),
                ActionScope::Iteration(i) => {
                    out.push_str("/iterations/");
                    out.push_str(&i.to_string());
                    out.push_str("/actions");
                }
            }
            out = pointer::push(&out, alias);
        }
        out
    }
}

impl std::fmt::Display for ActionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pointer())
    }
}
