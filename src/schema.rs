//! JSON-Schema subset validation.
//!
//! Schemas are kept as the parsed tree and interpreted directly, which
//! keeps arbitrarily nested `properties`/`items`/`oneOf` structures cheap
//! to walk. Supported keywords: `type`, `properties`, `required`,
//! `additionalProperties`, `items` (schema or tuple), `enum`, `const`,
//! `minimum`/`maximum`, `minLength`/`maxLength`, `pattern`,
//! `minItems`/`maxItems`, `uniqueItems`, `oneOf`/`anyOf`/`allOf`/`not`.

use crate::error::Error;
use crate::interp;
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;

/// A validation schema. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Schema {
    tree: Value,
}

/// One validation failure: a JSON-Pointer-style path plus the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
    pub(crate) coercion: bool,
}

impl Violation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: pointer_or_root(path),
            message: message.into(),
            coercion: false,
        }
    }

    fn coercion(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: pointer_or_root(path),
            message: message.into(),
            coercion: true,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn pointer_or_root(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Whether raw interpolation strings are tolerated (`Raw`) or strings are
/// coerced toward declared scalar types (`Resolved`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Mode {
    Raw,
    Resolved,
}

impl Schema {
    /// Parse a schema from YAML/JSON text. The root must be a mapping.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let tree = Value::try_from(doc)?;
        if !tree.is_mapping() {
            return Err(Error::Parse(format!(
                "schema root must be a mapping, got {}",
                tree.type_name()
            )));
        }
        Ok(Self { tree })
    }

    /// Read and parse a schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Validate `value`, collecting every failure.
    pub(crate) fn check(&self, value: &Value, mode: Mode) -> Vec<Violation> {
        let mut checker = Checker {
            mode,
            issues: Vec::new(),
        };
        checker.check_node(value, &self.tree, "");
        checker.issues
    }

    /// The schema node governing a dotted config path, resolved through
    /// `properties` and `items`.
    pub(crate) fn subschema_at(&self, path: &str) -> Option<&Value> {
        let mut node = &self.tree;
        if path.is_empty() {
            return Some(node);
        }
        for segment in path.split('.') {
            let map = node.as_mapping()?;
            node = if let Ok(index) = segment.parse::<usize>() {
                match map.get("items")? {
                    items @ Value::Mapping(_) => items,
                    Value::Sequence(tuple) => tuple.get(index)?,
                    _ => return None,
                }
            } else {
                map.get("properties")?.as_mapping()?.get(segment)?
            };
        }
        Some(node)
    }
}

/// Convert the first violation into the error taxonomy.
pub(crate) fn first_violation_error(issues: Vec<Violation>) -> Result<(), Error> {
    match issues.into_iter().next() {
        None => Ok(()),
        Some(v) if v.coercion => Err(Error::Coercion {
            path: v.path,
            message: v.message,
        }),
        Some(v) => Err(Error::Validation {
            path: v.path,
            message: v.message,
        }),
    }
}

/// Coerce a resolved tree toward the scalar types a schema declares,
/// recursing through `properties` and `items`. Values the schema does not
/// speak about pass through untouched.
pub(crate) fn coerce(value: &Value, schema: &Value, path: &str) -> Result<Value, Error> {
    let Some(map) = schema.as_mapping() else {
        return Ok(value.clone());
    };
    if let (Some(target), Value::String(s)) =
        (map.get("type").and_then(Value::as_str).and_then(coercion_target), value)
    {
        return coerce_str(s, target).map_err(|message| Error::Coercion {
            path: pointer_or_root(path),
            message,
        });
    }
    match value {
        Value::Mapping(entries) => {
            let properties = map.get("properties").and_then(Value::as_mapping);
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                let coerced = match properties.and_then(|p| p.get(key)) {
                    Some(subschema) => coerce(item, subschema, &format!("{path}/{key}"))?,
                    None => item.clone(),
                };
                out.insert(key.clone(), coerced);
            }
            Ok(Value::Mapping(out))
        }
        Value::Sequence(items) => {
            let schema_items = map.get("items");
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let subschema = match schema_items {
                    Some(node @ Value::Mapping(_)) => Some(node),
                    Some(Value::Sequence(tuple)) => tuple.get(index),
                    _ => None,
                };
                out.push(match subschema {
                    Some(subschema) => coerce(item, subschema, &format!("{path}/{index}"))?,
                    None => item.clone(),
                });
            }
            Ok(Value::Sequence(out))
        }
        other => Ok(other.clone()),
    }
}

/// Declared types that trigger string coercion.
#[derive(Debug, Clone, Copy)]
enum CoercionTarget {
    Bool,
    Int,
    Float,
}

fn coercion_target(declared: &str) -> Option<CoercionTarget> {
    match declared {
        "boolean" => Some(CoercionTarget::Bool),
        "integer" => Some(CoercionTarget::Int),
        "number" => Some(CoercionTarget::Float),
        _ => None,
    }
}

fn coerce_str(s: &str, target: CoercionTarget) -> Result<Value, String> {
    match target {
        CoercionTarget::Bool => match s {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("cannot coerce '{s}' to boolean")),
        },
        CoercionTarget::Int => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("cannot coerce '{s}' to integer")),
        CoercionTarget::Float => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("cannot coerce '{s}' to number")),
    }
}

struct Checker {
    mode: Mode,
    issues: Vec<Violation>,
}

impl Checker {
    fn check_node(&mut self, value: &Value, schema: &Value, path: &str) {
        let Some(schema_map) = schema.as_mapping() else {
            return;
        };

        // A raw string that still carries tokens could become anything
        // once resolved, so raw mode skips every keyword for it.
        if self.mode == Mode::Raw {
            if let Value::String(s) = value {
                if interp::contains_token(s) {
                    return;
                }
            }
        }

        // In resolved mode a string meets a declared scalar type through
        // lossless coercion; the coerced value feeds the remaining checks.
        let coerced;
        let value = match (self.mode, schema_map.get("type").and_then(Value::as_str), value) {
            (Mode::Resolved, Some(declared), Value::String(s)) => {
                match coercion_target(declared) {
                    Some(target) => match coerce_str(s, target) {
                        Ok(v) => {
                            coerced = v;
                            &coerced
                        }
                        Err(message) => {
                            self.issues.push(Violation::coercion(path, message));
                            return;
                        }
                    },
                    None => value,
                }
            }
            _ => value,
        };

        if let Some(declared) = schema_map.get("type").and_then(Value::as_str) {
            if !self.check_type(value, declared, path) {
                return;
            }
        }

        if let Some(options) = schema_map.get("enum").and_then(Value::as_sequence) {
            if !options.contains(value) {
                self.issues.push(Violation::new(
                    path,
                    format!("value is not one of the {} enum options", options.len()),
                ));
            }
        }
        if let Some(expected) = schema_map.get("const") {
            if value != expected {
                self.issues
                    .push(Violation::new(path, "value does not equal the const"));
            }
        }

        match value {
            Value::String(s) => self.check_string(s, schema_map, path),
            Value::Int(_) | Value::Float(_) => self.check_number(value, schema_map, path),
            Value::Sequence(items) => self.check_array(items, schema_map, path),
            Value::Mapping(entries) => self.check_object(entries, schema_map, path),
            _ => {}
        }

        self.check_combinators(value, schema_map, path);
    }

    /// Returns false when the value's shape already disqualifies the rest
    /// of the keyword checks.
    fn check_type(&mut self, value: &Value, declared: &str, path: &str) -> bool {
        let matches = match declared {
            "null" => matches!(value, Value::Null),
            "boolean" => matches!(value, Value::Bool(_)),
            "integer" => match value {
                Value::Int(_) => true,
                Value::Float(x) => x.fract() == 0.0,
                _ => false,
            },
            "number" => matches!(value, Value::Int(_) | Value::Float(_)),
            "string" => matches!(value, Value::String(_)),
            "array" => matches!(value, Value::Sequence(_)),
            "object" => matches!(value, Value::Mapping(_)),
            other => {
                self.issues.push(Violation::new(
                    path,
                    format!("schema declares unknown type '{other}'"),
                ));
                return false;
            }
        };
        if !matches {
            self.issues.push(Violation::new(
                path,
                format!("expected {declared}, got {}", value.type_name()),
            ));
        }
        matches
    }

    fn check_string(&mut self, s: &str, schema: &IndexMap<String, Value>, path: &str) {
        let length = s.chars().count();
        if let Some(min) = schema.get("minLength").and_then(Value::as_i64) {
            if (length as i64) < min {
                self.issues.push(Violation::new(
                    path,
                    format!("string is shorter than minLength {min}"),
                ));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_i64) {
            if (length as i64) > max {
                self.issues.push(Violation::new(
                    path,
                    format!("string is longer than maxLength {max}"),
                ));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            match Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(s) {
                        self.issues.push(Violation::new(
                            path,
                            format!("string does not match pattern '{pattern}'"),
                        ));
                    }
                }
                Err(_) => self.issues.push(Violation::new(
                    path,
                    format!("schema pattern '{pattern}' is not a valid regex"),
                )),
            }
        }
    }

    fn check_number(&mut self, value: &Value, schema: &IndexMap<String, Value>, path: &str) {
        let Some(actual) = value.as_f64() else {
            return;
        };
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if actual < min {
                self.issues
                    .push(Violation::new(path, format!("value is below minimum {min}")));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if actual > max {
                self.issues
                    .push(Violation::new(path, format!("value is above maximum {max}")));
            }
        }
    }

    fn check_array(&mut self, items: &[Value], schema: &IndexMap<String, Value>, path: &str) {
        if let Some(min) = schema.get("minItems").and_then(Value::as_i64) {
            if (items.len() as i64) < min {
                self.issues.push(Violation::new(
                    path,
                    format!("array has fewer than minItems {min}"),
                ));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_i64) {
            if (items.len() as i64) > max {
                self.issues.push(Violation::new(
                    path,
                    format!("array has more than maxItems {max}"),
                ));
            }
        }
        if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            for (i, item) in items.iter().enumerate() {
                if items[..i].contains(item) {
                    self.issues.push(Violation::new(
                        path,
                        format!("array items are not unique (index {i} repeats)"),
                    ));
                    break;
                }
            }
        }
        match schema.get("items") {
            Some(item_schema @ Value::Mapping(_)) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_node(item, item_schema, &format!("{path}/{i}"));
                }
            }
            Some(Value::Sequence(tuple)) => {
                for (i, (item, item_schema)) in items.iter().zip(tuple).enumerate() {
                    self.check_node(item, item_schema, &format!("{path}/{i}"));
                }
            }
            _ => {}
        }
    }

    fn check_object(
        &mut self,
        entries: &IndexMap<String, Value>,
        schema: &IndexMap<String, Value>,
        path: &str,
    ) {
        let properties = schema.get("properties").and_then(Value::as_mapping);
        if let Some(required) = schema.get("required").and_then(Value::as_sequence) {
            for name in required.iter().filter_map(Value::as_str) {
                if !entries.contains_key(name) {
                    self.issues.push(Violation::new(
                        &format!("{path}/{name}"),
                        "required property is missing",
                    ));
                }
            }
        }
        if let Some(properties) = properties {
            for (key, subschema) in properties {
                if let Some(item) = entries.get(key) {
                    self.check_node(item, subschema, &format!("{path}/{key}"));
                }
            }
        }
        match schema.get("additionalProperties") {
            Some(Value::Bool(false)) => {
                for key in entries.keys() {
                    if properties.is_none_or(|p| !p.contains_key(key)) {
                        self.issues.push(Violation::new(
                            &format!("{path}/{key}"),
                            "property is not allowed here",
                        ));
                    }
                }
            }
            Some(extra_schema @ Value::Mapping(_)) => {
                for (key, item) in entries {
                    if properties.is_none_or(|p| !p.contains_key(key)) {
                        self.check_node(item, extra_schema, &format!("{path}/{key}"));
                    }
                }
            }
            _ => {}
        }
    }

    fn check_combinators(
        &mut self,
        value: &Value,
        schema: &IndexMap<String, Value>,
        path: &str,
    ) {
        if let Some(all) = schema.get("allOf").and_then(Value::as_sequence) {
            for subschema in all {
                self.check_node(value, subschema, path);
            }
        }
        if let Some(any) = schema.get("anyOf").and_then(Value::as_sequence) {
            if !any.iter().any(|subschema| self.probe(value, subschema, path)) {
                self.issues.push(Violation::new(
                    path,
                    "value does not match any of the anyOf schemas",
                ));
            }
        }
        if let Some(one) = schema.get("oneOf").and_then(Value::as_sequence) {
            let passes = one
                .iter()
                .filter(|subschema| self.probe(value, subschema, path))
                .count();
            if passes != 1 {
                self.issues.push(Violation::new(
                    path,
                    format!("value matches {passes} of the oneOf schemas, expected exactly 1"),
                ));
            }
        }
        if let Some(not_schema) = schema.get("not") {
            if self.probe(value, not_schema, path) {
                self.issues
                    .push(Violation::new(path, "value matches the 'not' schema"));
            }
        }
    }

    /// Run a subschema without recording its failures.
    fn probe(&self, value: &Value, schema: &Value, path: &str) -> bool {
        let mut scratch = Checker {
            mode: self.mode,
            issues: Vec::new(),
        };
        scratch.check_node(value, schema, path);
        scratch.issues.is_empty()
    }
}
