//! Discriminator-keyed configuration nodes
//!
//! Every polymorphic node in an automation document selects its variant by
//! carrying exactly one known property key, e.g.
//! `{"httpTrigger": {...}}` or `{"textEquals": {...}}`.

use serde_json::{Map, Value};

use crate::{codes, ErrorData};

/// A node whose variant key has been identified
#[derive(Debug, Clone, Copy)]
pub struct DiscriminatedNode<'a> {
    /// The matched discriminator key
    pub key: &'a str,
    /// The value stored under that key
    pub body: &'a Value,
}

/// Find the single known discriminator key present on `object`
///
/// Keys not in `known` are ignored, so sibling properties (`name`, `alias`)
/// can live next to the discriminator. Zero or several matches is a
/// configuration error.
pub fn single_discriminator<'a>(
    object: &'a Map<String, Value>,
    known: &[&str],
    node_kind: &str,
) -> Result<DiscriminatedNode<'a>, ErrorData> {
    let mut found = object
        .iter()
        .filter(|(key, _)| known.contains(&key.as_str()));

    let first = found.next();
    let second = found.next();

    match (first, second) {
        (Some((key, body)), None) => Ok(DiscriminatedNode {
            key: key.as_str(),
            body,
        }),
        (None, _) => Err(invalid_discriminator(
            node_kind,
            format!(
                "A {} must have exactly one of the properties [{}], but none was found.",
                node_kind,
                known.join(", ")
            ),
            object,
        )),
        (Some((a, _)), Some((b, _))) => Err(invalid_discriminator(
            node_kind,
            format!(
                "A {} must have exactly one discriminator property, but both \"{}\" and \"{}\" were found.",
                node_kind, a, b
            ),
            object,
        )),
    }
}

/// Like [`single_discriminator`], for nodes that carry nothing but the
/// discriminator
///
/// Providers, actions and triggers keep their properties inside the
/// discriminator's body, so any sibling key is a misplaced or misspelt
/// property.
pub fn sole_discriminator<'a>(
    object: &'a Map<String, Value>,
    known: &[&str],
    node_kind: &str,
) -> Result<DiscriminatedNode<'a>, ErrorData> {
    let node = single_discriminator(object, known, node_kind)?;
    let unexpected: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|key| *key != node.key)
        .collect();
    if unexpected.is_empty() {
        return Ok(node);
    }
    Err(invalid_discriminator(
        node_kind,
        format!(
            "A {} must only contain its \"{}\" property, but [{}] were also found.",
            node_kind,
            node.key,
            unexpected.join(", ")
        ),
        object,
    ))
}

fn invalid_discriminator(node_kind: &str, message: String, object: &Map<String, Value>) -> ErrorData {
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    ErrorData::new(
        codes::INVALID_DISCRIMINATOR,
        "Invalid configuration",
        message,
        400,
    )
    .with_detail(format!("Node kind: {}", node_kind))
    .with_detail(format!("Properties present: [{}]", keys.join(", ")))
}
