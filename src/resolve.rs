//! Pull-based resolution of interpolation tokens.
//!
//! The engine walks a raw tree on demand, substituting tokens as it goes.
//! Nothing is cached between accesses and the raw tree is never mutated;
//! every access builds fresh values. Cycle detection uses a per-access
//! stack of fully-qualified dotted paths, so a `Config` can be shared
//! across threads while each call carries its own in-progress set.

use crate::error::Error;
use crate::interp::{self, Segment, Token};
use crate::registry::{self, Resolver, ResolverFailure};
use crate::value::{ResolvedValue, Value};
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Outcome of one access: the resolved subtree plus the destination paths
/// that picked up a taint along the way.
#[derive(Debug)]
pub struct Resolution {
    pub value: Value,
    pub sensitive_paths: BTreeSet<String>,
}

/// One resolution pass over a raw tree. Construct per access.
pub struct Engine<'a> {
    root: &'a Value,
    base_path: &'a Path,
    stack: Vec<String>,
    sensitive: BTreeSet<String>,
}

impl<'a> Engine<'a> {
    pub fn new(root: &'a Value, base_path: &'a Path) -> Self {
        Self {
            root,
            base_path,
            stack: Vec::new(),
            sensitive: BTreeSet::new(),
        }
    }

    /// Fully resolve the root mapping.
    pub fn resolve_root(mut self) -> Result<Resolution, Error> {
        debug!("resolving document root");
        let value = self.resolve_node(self.root, "")?;
        Ok(Resolution {
            value,
            sensitive_paths: self.sensitive,
        })
    }

    /// Resolve only the subtree at `path`, plus whatever it references.
    pub fn resolve_path(mut self, path: &str) -> Result<Resolution, Error> {
        debug!("resolving path '{path}'");
        let root = self.root;
        let subtree = root
            .get_path(path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        let value = self.resolve_node(subtree, path)?;
        Ok(Resolution {
            value,
            sensitive_paths: self.sensitive,
        })
    }

    fn resolve_node(&mut self, value: &Value, path: &str) -> Result<Value, Error> {
        if self.stack.iter().any(|entry| entry == path) {
            return Err(self.cycle_error(path));
        }
        self.stack.push(path.to_string());
        let result = self.resolve_inner(value, path);
        self.stack.pop();
        result
    }

    fn resolve_inner(&mut self, value: &Value, path: &str) -> Result<Value, Error> {
        match value {
            Value::String(s) => self.resolve_scalar(s, path),
            Value::Sequence(seq) => {
                let mut out = Vec::with_capacity(seq.len());
                for (index, item) in seq.iter().enumerate() {
                    out.push(self.resolve_node(item, &join_path(path, &index.to_string()))?);
                }
                Ok(Value::Sequence(out))
            }
            Value::Mapping(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve_node(item, &join_path(path, key))?);
                }
                Ok(Value::Mapping(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_scalar(&mut self, raw: &str, path: &str) -> Result<Value, Error> {
        let segments = interp::parse(raw)?;
        // A scalar that is exactly one token keeps the resolver's native
        // result type; anything else stringifies and concatenates.
        if let [Segment::Token(token)] = segments.as_slice() {
            return self.resolve_token(token, path, true);
        }
        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(token) => {
                    let value = self.resolve_token(token, path, false)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(Value::String(out))
    }

    fn resolve_token(&mut self, token: &Token, path: &str, native: bool) -> Result<Value, Error> {
        match token {
            Token::SelfRef { path: target } => {
                trace!("self-reference '{target}' from '{path}'");
                let root = self.root;
                let subtree = root
                    .get_path(target)
                    .ok_or_else(|| Error::PathNotFound(target.clone()))?;
                self.resolve_node(subtree, target)
            }
            Token::Call { name, arg, kwargs } => {
                trace!("dispatching resolver '{name}' from '{path}'");
                let arg = self.resolve_embedded(arg, path)?;

                // `default=` stays raw until a NotFound actually needs it,
                // so a broken default cannot fail a successful lookup.
                let mut default_raw: Option<&str> = None;
                let mut sensitive_override = None;
                let mut forwarded = BTreeMap::new();
                for (key, raw_value) in kwargs {
                    if key == "default" {
                        default_raw = Some(raw_value);
                        continue;
                    }
                    let value = self.resolve_embedded(raw_value, path)?;
                    match key.as_str() {
                        "sensitive" => {
                            sensitive_override = Some(match value.as_str() {
                                "true" => true,
                                "false" => false,
                                other => {
                                    return Err(Error::Parse(format!(
                                        "sensitive= expects true or false, got '{other}'"
                                    )))
                                }
                            })
                        }
                        _ => {
                            forwarded.insert(key.clone(), value);
                        }
                    }
                }

                let outcome = match registry::lookup(name) {
                    None => {
                        return Err(Error::Resolver(format!(
                            "no resolver registered under name '{name}'"
                        )))
                    }
                    Some(Resolver::Env) => resolve_env(&arg),
                    Some(Resolver::File) => resolve_file(self.base_path, &arg, native),
                    Some(Resolver::External(f)) => f.call(&arg, &forwarded),
                };

                let resolved = match outcome {
                    Ok(resolved) => resolved,
                    Err(ResolverFailure::NotFound(message)) => match default_raw {
                        Some(raw) => {
                            let text = self.resolve_embedded(raw, path)?;
                            ResolvedValue::new(Value::String(text))
                        }
                        None => {
                            return Err(Error::Resolver(format!(
                                "resolver '{name}' found nothing for '{arg}': {message}"
                            )))
                        }
                    },
                    Err(ResolverFailure::Failed(message)) => {
                        return Err(Error::Resolver(format!("resolver '{name}': {message}")))
                    }
                };

                if sensitive_override.unwrap_or(resolved.sensitive) {
                    self.sensitive.insert(path.to_string());
                }
                Ok(resolved.value)
            }
        }
    }

    /// Resolve a raw token argument or kwarg value (inner-first) down to
    /// the string handed to the resolver.
    fn resolve_embedded(&mut self, raw: &str, path: &str) -> Result<String, Error> {
        let value = self.resolve_scalar(raw, path)?;
        Ok(value.to_string())
    }

    fn cycle_error(&self, target: &str) -> Error {
        let mut cycle: Vec<&str> = match self.stack.iter().position(|entry| entry == target) {
            Some(start) => self.stack[start..].iter().map(String::as_str).collect(),
            None => self.stack.iter().map(String::as_str).collect(),
        };
        cycle.push(target);
        Error::Circular(cycle.join(" -> "))
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

fn resolve_env(name: &str) -> Result<ResolvedValue, ResolverFailure> {
    match std::env::var(name) {
        Ok(value) => Ok(ResolvedValue::new(Value::String(value))),
        Err(std::env::VarError::NotPresent) => Err(ResolverFailure::NotFound(format!(
            "environment variable '{name}' is not set"
        ))),
        Err(std::env::VarError::NotUnicode(_)) => Err(ResolverFailure::Failed(format!(
            "environment variable '{name}' is not valid unicode"
        ))),
    }
}

/// Built-in `file` resolver. Relative paths anchor at the owning config's
/// base path; the handle is scoped to this call. When the token is the
/// entire scalar and the file looks like YAML/JSON, the parsed structure
/// is substituted instead of the text.
fn resolve_file(base_path: &Path, arg: &str, native: bool) -> Result<ResolvedValue, ResolverFailure> {
    let requested = Path::new(arg);
    let full = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        base_path.join(requested)
    };
    let text = match std::fs::read_to_string(&full) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResolverFailure::NotFound(format!(
                "file not found: {}",
                full.display()
            )))
        }
        Err(e) => {
            return Err(ResolverFailure::Failed(format!(
                "failed to read {}: {e}",
                full.display()
            )))
        }
    };
    let structured = native
        && matches!(
            full.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml" | "json")
        );
    if structured {
        let doc: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| {
            ResolverFailure::Failed(format!("failed to parse {}: {e}", full.display()))
        })?;
        let value = Value::try_from(doc).map_err(|e| ResolverFailure::Failed(e.to_string()))?;
        Ok(ResolvedValue::new(value))
    } else {
        Ok(ResolvedValue::new(Value::String(text)))
    }
}
