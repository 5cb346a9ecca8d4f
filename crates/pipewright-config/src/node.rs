//! Helpers for extracting values from KDL nodes.

use kdl::KdlNode;

use crate::{ConfigError, ConfigResult};

pub(crate) fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// The node's first argument, which must be a string.
pub(crate) fn require_string_arg(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

/// Every `key="value"` property in order, rejecting non-string values.
pub(crate) fn string_props(node: &KdlNode) -> ConfigResult<Vec<(String, String)>> {
    let mut props = Vec::new();
    for entry in node.entries() {
        let Some(name) = entry.name() else {
            continue;
        };
        let value = entry
            .value()
            .as_string()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: name.value().to_string(),
                message: "expected a string".to_string(),
            })?;
        props.push((name.value().to_string(), value.to_string()));
    }
    Ok(props)
}

/// `name "value"` children of a block node, in order.
pub(crate) fn child_string_pairs(node: &KdlNode) -> ConfigResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value().to_string();
            let value = require_string_arg(child, &key)?;
            pairs.push((key, value));
        }
    }
    Ok(pairs)
}
