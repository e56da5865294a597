//! Path lookup over JSON documents
//!
//! Two grammars are supported:
//!
//! - absolute pointers in RFC 6901 form (`/foo/1/bar`, `~0` and `~1` escapes)
//! - relative pointers (`0`, `1/0`, `0#`, `1#`) evaluated against a context
//!   pointer. The leading integer moves that many levels up from the context;
//!   it is followed by nothing, a forward path, or `#` which yields the
//!   array index or property name of the location reached.
//!
//! A lookup has three outcomes that callers must keep apart: a non-null
//! value, an explicit null, and nothing at all. Walking *through* a null
//! intermediate is an error rather than a miss.

use serde_json::Value;
use std::borrow::Cow;
use thiserror::Error;

use crate::{codes, ErrorData};

/// Errors raised while walking a pointer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("invalid pointer '{0}': {1}")]
    Invalid(String, &'static str),

    #[error("relative pointer '{0}' needs a context pointer")]
    MissingContext(String),

    #[error("relative pointer '{pointer}' goes {levels} levels up from '{context}'")]
    AboveRoot {
        pointer: String,
        context: String,
        levels: usize,
    },

    #[error("path '{path}' has a null value at '{at}' with segments remaining")]
    NullIntermediate { path: String, at: String },
}

impl PointerError {
    /// Convert to the structured payload surfaced to callers
    pub fn to_error_data(&self) -> ErrorData {
        let path = match self {
            PointerError::Invalid(p, _) | PointerError::MissingContext(p) => p,
            PointerError::AboveRoot { pointer, .. } => pointer,
            PointerError::NullIntermediate { path, .. } => path,
        };
        ErrorData::new(
            codes::PATH_RESOLUTION_ERROR,
            "Path resolution error",
            self.to_string(),
            500,
        )
        .with_detail(format!("Path: {}", path))
    }
}

impl From<PointerError> for ErrorData {
    fn from(err: PointerError) -> Self {
        err.to_error_data()
    }
}

/// Result of a lookup
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome<'a> {
    /// A non-null value was found
    Found(Cow<'a, Value>),
    /// The location exists and holds an explicit null
    Null,
    /// Nothing exists at the location
    NotFound,
}

impl<'a> PathOutcome<'a> {
    fn from_value(value: &'a Value) -> Self {
        if value.is_null() {
            PathOutcome::Null
        } else {
            PathOutcome::Found(Cow::Borrowed(value))
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PathOutcome::NotFound)
    }

    /// Found values and explicit nulls both count as existing
    pub fn exists(&self) -> bool {
        !self.is_not_found()
    }

    /// Detach the outcome from the document it was read from
    pub fn into_owned(self) -> PathOutcome<'static> {
        match self {
            PathOutcome::Found(v) => PathOutcome::Found(Cow::Owned(v.into_owned())),
            PathOutcome::Null => PathOutcome::Null,
            PathOutcome::NotFound => PathOutcome::NotFound,
        }
    }

    /// Collapse to an owned value, `None` only when nothing was found
    pub fn into_value(self) -> Option<Value> {
        match self {
            PathOutcome::Found(v) => Some(v.into_owned()),
            PathOutcome::Null => Some(Value::Null),
            PathOutcome::NotFound => None,
        }
    }
}

/// Whether `path` uses the relative grammar
pub fn is_relative(path: &str) -> bool {
    path.starts_with(|c: char| c.is_ascii_digit())
}

/// Escape a single reference token
pub fn escape(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Append an escaped token to a pointer
pub fn push(pointer: &str, token: &str) -> String {
    format!("{}/{}", pointer, escape(token))
}

/// Split an absolute pointer into unescaped tokens
pub fn tokens(pointer: &str) -> Result<Vec<String>, PointerError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| PointerError::Invalid(pointer.to_string(), "must start with '/'"))?;
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Look up an absolute pointer in `root`
pub fn lookup<'a>(root: &'a Value, pointer: &str) -> Result<PathOutcome<'a>, PointerError> {
    let tokens = tokens(pointer)?;
    walk(root, &tokens, pointer)
}

/// Look up an absolute or relative pointer
///
/// `context` is the absolute pointer relative lookups start from. It is
/// ignored for absolute pointers.
pub fn lookup_with_context<'a>(
    root: &'a Value,
    pointer: &str,
    context: Option<&str>,
) -> Result<PathOutcome<'a>, PointerError> {
    if !is_relative(pointer) {
        return lookup(root, pointer);
    }

    let context = context.ok_or_else(|| PointerError::MissingContext(pointer.to_string()))?;
    let digits = pointer
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(pointer.len());
    let (levels, suffix) = pointer.split_at(digits);
    let levels: usize = levels
        .parse()
        .map_err(|_| PointerError::Invalid(pointer.to_string(), "bad level count"))?;
    if levels.to_string().len() != digits {
        return Err(PointerError::Invalid(
            pointer.to_string(),
            "level count has leading zeros",
        ));
    }

    let context_tokens = tokens(context)?;
    if levels > context_tokens.len() {
        return Err(PointerError::AboveRoot {
            pointer: pointer.to_string(),
            context: context.to_string(),
            levels,
        });
    }
    let base = &context_tokens[..context_tokens.len() - levels];

    match suffix {
        "" => walk(root, base, pointer),
        "#" => {
            let Some((name, parent)) = base.split_last() else {
                return Err(PointerError::AboveRoot {
                    pointer: pointer.to_string(),
                    context: context.to_string(),
                    levels,
                });
            };
            match walk(root, parent, pointer)? {
                PathOutcome::Found(container) => match container.as_ref() {
                    Value::Array(_) => match name.parse::<u64>() {
                        Ok(index) => Ok(PathOutcome::Found(Cow::Owned(Value::from(index)))),
                        Err(_) => Ok(PathOutcome::NotFound),
                    },
                    _ => Ok(PathOutcome::Found(Cow::Owned(Value::String(name.clone())))),
                },
                other => Ok(other),
            }
        }
        rest if rest.starts_with('/') => {
            let mut all = base.to_vec();
            all.extend(tokens(rest)?);
            walk(root, &all, pointer)
        }
        _ => Err(PointerError::Invalid(
            pointer.to_string(),
            "expected '#' or '/' after the level count",
        )),
    }
}

fn walk<'a>(root: &'a Value, tokens: &[String], display: &str) -> Result<PathOutcome<'a>, PointerError> {
    let mut current = root;
    for (i, token) in tokens.iter().enumerate() {
        current = match current {
            Value::Object(map) => match map.get(token) {
                Some(v) => v,
                None => return Ok(PathOutcome::NotFound),
            },
            Value::Array(items) => match array_index(token).and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Ok(PathOutcome::NotFound),
            },
            Value::Null => {
                let at: String = tokens[..i].iter().map(|t| format!("/{}", escape(t))).collect();
                return Err(PointerError::NullIntermediate {
                    path: display.to_string(),
                    at,
                });
            }
            // scalars have no children
            _ => return Ok(PathOutcome::NotFound),
        };
    }
    Ok(PathOutcome::from_value(current))
}

fn array_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}
