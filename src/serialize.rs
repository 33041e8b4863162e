//! YAML/JSON emission and the redaction pass.

use crate::error::Error;
use crate::value::Value;
use std::collections::BTreeSet;

/// What a sensitive leaf becomes in redacted output.
pub const REDACTED: &str = "***REDACTED***";

/// Block-style YAML, keys in insertion order, strings quoted only when the
/// emitter needs to.
pub fn to_yaml_string(value: &Value) -> Result<String, Error> {
    Ok(serde_yaml::to_string(value)?)
}

/// Two-space-indented JSON, keys in insertion order.
pub fn to_json_string(value: &Value) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Replace every tainted destination path with the redaction marker.
/// Containers holding a sensitive leaf stay intact; only the leaf itself
/// is blanked.
pub fn redact_paths(value: &mut Value, sensitive_paths: &BTreeSet<String>) {
    for path in sensitive_paths {
        replace_at(value, path);
    }
}

fn replace_at(value: &mut Value, path: &str) {
    let mut node = value;
    for segment in path.split('.') {
        node = match node {
            Value::Mapping(map) => match map.get_mut(segment) {
                Some(child) => child,
                None => return,
            },
            Value::Sequence(seq) => {
                let Ok(index) = segment.parse::<usize>() else {
                    return;
                };
                match seq.get_mut(index) {
                    Some(child) => child,
                    None => return,
                }
            }
            _ => return,
        };
    }
    *node = Value::String(REDACTED.to_string());
}
