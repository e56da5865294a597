//! HTTP request and response records

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

/// An HTTP request, either inbound (trigger) or outbound (action)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestData {
    /// Full request URL
    #[serde(default)]
    pub url: String,

    /// Upper-case verb (`GET`, `POST`, ...)
    #[serde(default)]
    pub http_verb: String,

    /// Path component of the URL
    #[serde(default, skip_serializing_if = "is_empty")]
    pub path: String,

    /// Portion of the path addressed to the automations route, matched
    /// against trigger endpoint paths
    #[serde(default, skip_serializing_if = "is_empty")]
    pub action_path: String,

    /// Query string without the leading `?`
    #[serde(default, skip_serializing_if = "is_empty")]
    pub query_string: String,

    /// Segments of `action_path`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_segments: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Body, parsed as JSON when the content type is JSON, else a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl HttpRequestData {
    /// Build a request from a verb and URL, splitting out path and query
    ///
    /// The URL may be absolute (`https://host/a/b?x=1`) or a bare path.
    pub fn new(http_verb: &str, url: impl Into<String>) -> Self {
        let url = url.into();
        let without_scheme = match url.find("://") {
            Some(i) => {
                let rest = &url[i + 3..];
                rest.find('/').map(|p| &rest[p..]).unwrap_or("/")
            }
            None => url.as_str(),
        };
        let without_fragment = without_scheme.split('#').next().unwrap_or_default();
        let (path, query) = match without_fragment.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (without_fragment.to_string(), String::new()),
        };

        let mut request = Self {
            http_verb: http_verb.to_ascii_uppercase(),
            path: path.clone(),
            query_string: query,
            ..Default::default()
        };
        request.set_action_path(&path);
        request.url = url;
        request
    }

    /// Set the portion of the path matched against trigger endpoints
    pub fn set_action_path(&mut self, action_path: &str) {
        self.action_path = action_path.to_string();
        self.path_segments = split_segments(action_path);
    }

    pub fn with_action_path(mut self, action_path: &str) -> Self {
        self.set_action_path(action_path);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_content(mut self, content_type: impl Into<String>, content: Value) -> Self {
        self.content_type = Some(content_type.into());
        self.content = Some(content);
        self
    }

    /// Header lookup ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query parameters in declared order
    pub fn query_parameters(&self) -> Vec<(&str, &str)> {
        self.query_string
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|p| p.split_once('=').unwrap_or((p, "")))
            .collect()
    }
}

/// Split a path into its non-empty segments
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// An HTTP response, either returned to a trigger caller or received by an
/// HTTP request action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseData {
    pub http_status_code: u16,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl HttpResponseData {
    pub fn new(http_status_code: u16) -> Self {
        Self {
            http_status_code,
            headers: IndexMap::new(),
            content_type: None,
            content: None,
        }
    }

    pub fn json(http_status_code: u16, content: Value) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            content: Some(content),
            ..Self::new(http_status_code)
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status_code)
    }
}

impl Default for HttpResponseData {
    fn default() -> Self {
        Self::new(200)
    }
}

/// Whether a content type denotes a JSON body
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
