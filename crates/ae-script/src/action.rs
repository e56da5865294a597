//! Compiled actions
//!
//! An [`Action`] carries the properties common to every action kind plus a
//! closed [`ActionKind`] with the kind-specific providers and collaborators.
//! Actions are immutable once built and shared by every invocation.

use std::sync::Arc;

use ae_core::ErrorData;
use ae_data::{ActionDetail, ActionLocation, ActionScope};
use ae_providers::{BoxedProvider, EmailSender, EventPublisher, HttpClient};

use crate::error_condition::ErrorCondition;

#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<BoxedProvider>,
    pub before_run_error_conditions: Vec<ErrorCondition>,
    pub after_run_error_conditions: Vec<ErrorCondition>,
    pub on_error_actions: Vec<Action>,
    pub run_asynchronously: bool,
    pub kind: ActionKind,
}

impl Action {
    /// Empty record detail for this action's kind
    pub fn initial_detail(&self) -> ActionDetail {
        match &self.kind {
            ActionKind::HttpRequest(_) => ActionDetail::http_request(),
            ActionKind::SetVariable(_) => ActionDetail::set_variable(),
            ActionKind::RaiseEvent(_) => ActionDetail::raise_event(),
            ActionKind::Group(_) => ActionDetail::group(),
            ActionKind::Iterate(_) => ActionDetail::iterate(),
            ActionKind::SendEmail(_) => ActionDetail::send_email(),
            ActionKind::RaiseError(_) => ActionDetail::RaiseError,
        }
    }

    /// The compiled action a record location refers to
    pub fn locate<'a>(actions: &'a [Action], location: &ActionLocation) -> Option<&'a Action> {
        let mut list = actions;
        let mut current: Option<&'a Action> = None;
        for (scope, alias) in location.segments() {
            if let Some(parent) = current {
                list = match scope {
                    ActionScope::Actions => return None,
                    ActionScope::OnErrorActions => parent.on_error_actions.as_slice(),
                    ActionScope::ChildActions | ActionScope::Iteration(_) => parent.children(),
                };
            }
            current = Some(list.iter().find(|a| &a.alias == alias)?);
        }
        current
    }

    /// Child actions of a group or iterate action
    pub fn children(&self) -> &[Action] {
        match &self.kind {
            ActionKind::Group(actions) => actions,
            ActionKind::Iterate(iterate) => &iterate.actions,
            _ => &[],
        }
    }
}

/// Kind-specific part of a compiled action
#[derive(Debug, Clone)]
pub enum ActionKind {
    HttpRequest(HttpRequestAction),
    SetVariable(SetVariableAction),
    RaiseEvent(RaiseEventAction),
    Group(Vec<Action>),
    Iterate(IterateAction),
    SendEmail(SendEmailAction),
    RaiseError(ErrorData),
}

#[derive(Clone)]
pub struct HttpRequestAction {
    pub client: Arc<dyn HttpClient>,
    pub http_verb: BoxedProvider,
    pub url: BoxedProvider,
    pub headers: Vec<(String, BoxedProvider)>,
    pub content_type: Option<BoxedProvider>,
    pub content: Option<BoxedProvider>,
}

impl std::fmt::Debug for HttpRequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequestAction")
            .field("http_verb", &self.http_verb)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Sets a variable; `path` is relative to `/variables`
#[derive(Debug, Clone)]
pub struct SetVariableAction {
    pub path: String,
    pub value: BoxedProvider,
}

#[derive(Clone)]
pub struct RaiseEventAction {
    pub events: Arc<dyn EventPublisher>,
    pub event_type: BoxedProvider,
    pub custom_event_alias: Option<BoxedProvider>,
    pub event_data: Option<BoxedProvider>,
}

impl std::fmt::Debug for RaiseEventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaiseEventAction")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// Runs its actions once per list item
#[derive(Debug, Clone)]
pub struct IterateAction {
    pub list: BoxedProvider,
    pub actions: Vec<Action>,
}

#[derive(Clone)]
pub struct SendEmailAction {
    pub sender: Arc<dyn EmailSender>,
    pub from: BoxedProvider,
    pub to: BoxedProvider,
    pub cc: Option<BoxedProvider>,
    pub bcc: Option<BoxedProvider>,
    pub subject: BoxedProvider,
    pub text_body: Option<BoxedProvider>,
    pub html_body: Option<BoxedProvider>,
}

impl std::fmt::Debug for SendEmailAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendEmailAction")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
