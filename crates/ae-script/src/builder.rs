//! Parsing action configuration and building compiled actions
//!
//! An action node carries exactly one kind key, with every property of the
//! action inside it:
//!
//! ```json
//! {"httpRequestAction": {"name": "Get quote", "alias": "getQuote",
//!   "url": {"templateText": "https://quotes.test/{{ variables.id }}"},
//!   "afterRunErrorConditions": [...], "onErrorActions": [...]}}
//! ```

use ae_core::{sole_discriminator, ErrorData};
use ae_providers::parse::{
    as_array, as_object, malformed, optional_bool, optional_str, required, required_str,
    BuildResult,
};
use ae_providers::{Dependencies, ProviderBuilder};
use serde_json::{Map, Value};

use crate::action::{
    Action, ActionKind, HttpRequestAction, IterateAction, RaiseEventAction, SendEmailAction,
    SetVariableAction,
};
use crate::error_condition::{parse_error_payload, ErrorConditionBuilder};

/// Every discriminator key an action node may carry
pub const ACTION_KEYS: &[&str] = &[
    "httpRequestAction",
    "setVariableAction",
    "raiseEventAction",
    "groupAction",
    "iterateAction",
    "sendEmailAction",
    "raiseErrorAction",
];

/// Configuration of one action, parsed but not yet built
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub run_condition: Option<ProviderBuilder>,
    pub before_run_error_conditions: Vec<ErrorConditionBuilder>,
    pub after_run_error_conditions: Vec<ErrorConditionBuilder>,
    pub on_error_actions: Vec<ActionBuilder>,
    pub run_asynchronously: bool,
    pub kind: ActionKindBuilder,
}

#[derive(Debug, Clone)]
pub enum ActionKindBuilder {
    HttpRequest {
        http_verb: ProviderBuilder,
        url: ProviderBuilder,
        headers: Vec<(String, ProviderBuilder)>,
        content_type: Option<ProviderBuilder>,
        content: Option<ProviderBuilder>,
    },
    SetVariable {
        path: String,
        value: ProviderBuilder,
    },
    RaiseEvent {
        event_type: ProviderBuilder,
        custom_event_alias: Option<ProviderBuilder>,
        event_data: Option<ProviderBuilder>,
    },
    Group(Vec<ActionBuilder>),
    Iterate {
        list: ProviderBuilder,
        actions: Vec<ActionBuilder>,
    },
    SendEmail {
        from: ProviderBuilder,
        to: ProviderBuilder,
        cc: Option<ProviderBuilder>,
        bcc: Option<ProviderBuilder>,
        subject: ProviderBuilder,
        text_body: Option<ProviderBuilder>,
        html_body: Option<ProviderBuilder>,
    },
    RaiseError(ErrorData),
}

impl ActionBuilder {
    pub fn parse(value: &Value) -> BuildResult<Self> {
        let object = as_object(value, "action")?;
        let node = sole_discriminator(object, ACTION_KEYS, "action")?;
        let body = as_object(node.body, node.key)?;
        let kind = node.key;

        let alias = required_str(body, "alias", kind)?.to_string();
        Self::parse_body(kind, body).map_err(|e| e.with_detail(format!("Action alias: {}", alias)))
    }

    fn parse_body(kind: &str, body: &Map<String, Value>) -> BuildResult<Self> {
        let kind_builder = match kind {
            "httpRequestAction" => ActionKindBuilder::HttpRequest {
                http_verb: ProviderBuilder::parse_optional(body, "httpVerb")?
                    .unwrap_or_else(|| ProviderBuilder::literal("GET")),
                url: ProviderBuilder::parse_required(body, "url", kind)?,
                headers: match body.get("headers") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(headers) => as_object(headers, "headers")?
                        .iter()
                        .map(|(name, v)| Ok((name.clone(), ProviderBuilder::parse(v)?)))
                        .collect::<BuildResult<_>>()?,
                },
                content_type: ProviderBuilder::parse_optional(body, "contentType")?,
                content: ProviderBuilder::parse_optional(body, "content")?,
            },
            "setVariableAction" => {
                let path = match optional_str(body, "variableName", kind)? {
                    Some(name) => name.to_string(),
                    None => required_str(body, "path", kind)?.to_string(),
                };
                ActionKindBuilder::SetVariable {
                    path,
                    value: ProviderBuilder::parse_required(body, "value", kind)?,
                }
            }
            "raiseEventAction" => ActionKindBuilder::RaiseEvent {
                event_type: ProviderBuilder::parse_required(body, "eventType", kind)?,
                custom_event_alias: ProviderBuilder::parse_optional(body, "customEventAlias")?,
                event_data: ProviderBuilder::parse_optional(body, "eventData")?,
            },
            "groupAction" => {
                ActionKindBuilder::Group(parse_actions(required(body, "actions", kind)?)?)
            }
            "iterateAction" => ActionKindBuilder::Iterate {
                list: ProviderBuilder::parse_required(body, "list", kind)?,
                actions: parse_actions(required(body, "actions", kind)?)?,
            },
            "sendEmailAction" => ActionKindBuilder::SendEmail {
                from: ProviderBuilder::parse_required(body, "from", kind)?,
                to: ProviderBuilder::parse_required(body, "to", kind)?,
                cc: ProviderBuilder::parse_optional(body, "cc")?,
                bcc: ProviderBuilder::parse_optional(body, "bcc")?,
                subject: ProviderBuilder::parse_required(body, "subject", kind)?,
                text_body: ProviderBuilder::parse_optional(body, "textBody")?,
                html_body: ProviderBuilder::parse_optional(body, "htmlBody")?,
            },
            "raiseErrorAction" => {
                ActionKindBuilder::RaiseError(parse_error_payload(required(body, "error", kind)?, kind)?)
            }
            other => {
                return Err(malformed(
                    "action",
                    format!("The action kind \"{}\" is not supported.", other),
                ))
            }
        };

        Ok(Self {
            name: required_str(body, "name", kind)?.to_string(),
            alias: required_str(body, "alias", kind)?.to_string(),
            description: optional_str(body, "description", kind)?.map(str::to_string),
            run_condition: ProviderBuilder::parse_optional(body, "runCondition")?,
            before_run_error_conditions: ErrorConditionBuilder::parse_list(
                body,
                "beforeRunErrorConditions",
            )?,
            after_run_error_conditions: ErrorConditionBuilder::parse_list(
                body,
                "afterRunErrorConditions",
            )?,
            on_error_actions: match body.get("onErrorActions") {
                None | Some(Value::Null) => Vec::new(),
                Some(actions) => parse_actions(actions)?,
            },
            run_asynchronously: optional_bool(body, "runAsynchronously", false, kind)?,
            kind: kind_builder,
        })
    }

    /// Every alias in this action's tree, in declaration order
    pub fn aliases(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_aliases(&mut out);
        out
    }

    fn collect_aliases<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.alias);
        let children: &[ActionBuilder] = match &self.kind {
            ActionKindBuilder::Group(actions) => actions,
            ActionKindBuilder::Iterate { actions, .. } => actions,
            _ => &[],
        };
        for child in children.iter().chain(self.on_error_actions.iter()) {
            child.collect_aliases(out);
        }
    }

    pub fn build(&self, deps: &Dependencies) -> Action {
        let build_all =
            |actions: &[ActionBuilder]| actions.iter().map(|a| a.build(deps)).collect::<Vec<_>>();
        let build_opt = |b: &Option<ProviderBuilder>| b.as_ref().map(|b| b.build(deps));

        let kind = match &self.kind {
            ActionKindBuilder::HttpRequest {
                http_verb,
                url,
                headers,
                content_type,
                content,
            } => ActionKind::HttpRequest(HttpRequestAction {
                client: deps.http_client.clone(),
                http_verb: http_verb.build(deps),
                url: url.build(deps),
                headers: headers
                    .iter()
                    .map(|(name, b)| (name.clone(), b.build(deps)))
                    .collect(),
                content_type: build_opt(content_type),
                content: build_opt(content),
            }),
            ActionKindBuilder::SetVariable { path, value } => {
                ActionKind::SetVariable(SetVariableAction {
                    path: path.clone(),
                    value: value.build(deps),
                })
            }
            ActionKindBuilder::RaiseEvent {
                event_type,
                custom_event_alias,
                event_data,
            } => ActionKind::RaiseEvent(RaiseEventAction {
                events: deps.events.clone(),
                event_type: event_type.build(deps),
                custom_event_alias: build_opt(custom_event_alias),
                event_data: build_opt(event_data),
            }),
            ActionKindBuilder::Group(actions) => ActionKind::Group(build_all(actions)),
            ActionKindBuilder::Iterate { list, actions } => ActionKind::Iterate(IterateAction {
                list: list.build(deps),
                actions: build_all(actions),
            }),
            ActionKindBuilder::SendEmail {
                from,
                to,
                cc,
                bcc,
                subject,
                text_body,
                html_body,
            } => ActionKind::SendEmail(SendEmailAction {
                sender: deps.email.clone(),
                from: from.build(deps),
                to: to.build(deps),
                cc: build_opt(cc),
                bcc: build_opt(bcc),
                subject: subject.build(deps),
                text_body: build_opt(text_body),
                html_body: build_opt(html_body),
            }),
            ActionKindBuilder::RaiseError(error) => ActionKind::RaiseError(error.clone()),
        };

        Action {
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            run_condition: build_opt(&self.run_condition),
            before_run_error_conditions: self
                .before_run_error_conditions
                .iter()
                .map(|c| c.build(deps))
                .collect(),
            after_run_error_conditions: self
                .after_run_error_conditions
                .iter()
                .map(|c| c.build(deps))
                .collect(),
            on_error_actions: build_all(&self.on_error_actions),
            run_asynchronously: self.run_asynchronously,
            kind,
        }
    }
}

/// Parse a JSON array of action nodes
pub fn parse_actions(value: &Value) -> BuildResult<Vec<ActionBuilder>> {
    as_array(value, "action list")?
        .iter()
        .map(ActionBuilder::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::codes;
    use serde_json::json;

    #[test]
    fn test_parse_common_properties() {
        let action = ActionBuilder::parse(&json!({"setVariableAction": {
            "name": "Remember",
            "alias": "remember",
            "variableName": "x",
            "value": 1,
            "runCondition": true,
            "runAsynchronously": true,
            "beforeRunErrorConditions": [{"condition": false, "error": {
                "code": "c", "title": "t", "message": "m", "httpStatusCode": 400
            }}],
            "onErrorActions": [{"raiseErrorAction": {"name": "Re-raise", "alias": "reraise",
                "error": {"code": "c", "title": "t", "message": "m", "httpStatusCode": 500}}}]
        }}))
        .unwrap();

        assert_eq!(action.alias, "remember");
        assert!(action.run_condition.is_some());
        assert!(action.run_asynchronously);
        assert_eq!(action.before_run_error_conditions.len(), 1);
        assert_eq!(action.on_error_actions.len(), 1);
        assert!(matches!(action.kind, ActionKindBuilder::SetVariable { ref path, .. } if path == "x"));
    }

    #[test]
    fn test_aliases_include_nested_actions() {
        let action = ActionBuilder::parse(&json!({"groupAction": {
            "name": "Group", "alias": "outer",
            "actions": [
                {"setVariableAction": {"name": "A", "alias": "a", "variableName": "a", "value": 1}},
                {"iterateAction": {"name": "Loop", "alias": "loop", "list": [1, 2],
                    "actions": [{"setVariableAction": {"name": "B", "alias": "b", "path": "/b", "value": 2}}]}}
            ]
        }}))
        .unwrap();
        assert_eq!(action.aliases(), vec!["outer", "a", "loop", "b"]);
    }

    #[test]
    fn test_missing_alias_and_unknown_kind() {
        let err = ActionBuilder::parse(&json!({"groupAction": {"name": "G", "actions": []}}))
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);

        let err = ActionBuilder::parse(&json!({"teleportAction": {}})).unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
    }

    #[test]
    fn test_properties_outside_the_action_body_rejected() {
        let err = ActionBuilder::parse(&json!({
            "setVariableAction": {"name": "Total", "alias": "total", "variableName": "total", "value": 1},
            "runAsynchronously": true
        }))
        .unwrap_err();
        assert_eq!(err.code, codes::INVALID_DISCRIMINATOR);
        assert!(err.message.contains("runAsynchronously"));
    }

    #[test]
    fn test_errors_name_the_action() {
        let err = ActionBuilder::parse(&json!({"httpRequestAction": {"name": "Call", "alias": "call"}}))
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_PROPERTY);
        assert!(err.additional_details.contains(&"Action alias: call".to_string()));
    }
}
