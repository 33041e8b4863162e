//! The `Config` facade: document loading, merging, access, validation,
//! and serialization.
//!
//! A `Config` is immutable after construction. Every accessor pulls a
//! fresh resolution pass over the stored raw tree, so concurrent reads
//! from multiple threads are safe and see consistent point-in-time values.

use crate::error::Error;
use crate::merge;
use crate::resolve::Engine;
use crate::schema::{self, Mode, Schema, Violation};
use crate::serialize;
use crate::value::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One entry of a multi-file merge. A missing optional file contributes an
/// empty mapping; a missing required file fails the load.
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub path: PathBuf,
    pub optional: bool,
}

impl FileSpec {
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: false,
        }
    }

    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: true,
        }
    }
}

/// A loaded configuration document (or merged stack of documents).
#[derive(Debug, Clone)]
pub struct Config {
    raw: Value,
    base_path: PathBuf,
    schema: Option<Schema>,
}

impl Config {
    /// Parse a single YAML/JSON document from text. `base_path` anchors
    /// relative paths used by the `file` resolver and defaults to the
    /// current directory.
    pub fn loads(text: &str, base_path: Option<&Path>) -> Result<Self, Error> {
        Ok(Self {
            raw: parse_document(text)?,
            base_path: base_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            schema: None,
        })
    }

    /// Read and parse one file; its directory becomes the base path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let raw = parse_document(&text).map_err(|e| annotate(e, path))?;
        Ok(Self {
            raw,
            base_path: parent_dir(path),
            schema: None,
        })
    }

    /// Read, parse, and deep-merge several files. The first file's
    /// directory becomes the base path.
    pub fn load_merged<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let specs: Vec<FileSpec> = paths
            .iter()
            .map(|p| FileSpec::required(p.as_ref()))
            .collect();
        Self::load_merged_with_specs(&specs)
    }

    /// Like [`Config::load_merged`], with per-file optional markers.
    pub fn load_merged_with_specs(specs: &[FileSpec]) -> Result<Self, Error> {
        let mut documents = Vec::with_capacity(specs.len());
        for spec in specs {
            let text = match fs::read_to_string(&spec.path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && spec.optional => {
                    continue;
                }
                Err(e) => return Err(Error::Io(e)),
            };
            documents.push(parse_document(&text).map_err(|e| annotate(e, &spec.path))?);
        }
        let base_path = specs
            .first()
            .map(|spec| parent_dir(&spec.path))
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            raw: merge::merge_documents(documents),
            base_path,
            schema: None,
        })
    }

    /// Attach a schema. Subsequent `get` calls coerce their result toward
    /// the scalar type the schema declares at that path.
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve and return the subtree at a dotted path.
    pub fn get(&self, path: &str) -> Result<Value, Error> {
        let resolution = Engine::new(&self.raw, &self.base_path).resolve_path(path)?;
        let mut value = resolution.value;
        if let Some(attached) = &self.schema {
            if let Some(subschema) = attached.subschema_at(path) {
                value = schema::coerce(&value, subschema, "")?;
            }
        }
        Ok(value)
    }

    /// Return the unresolved subtree at a dotted path.
    pub fn get_raw(&self, path: &str) -> Result<Value, Error> {
        self.raw
            .get_path(path)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(path.to_string()))
    }

    /// The whole tree as a `Value`. With `resolve` every token is
    /// substituted; `redact` (meaningful only with `resolve`) blanks
    /// sensitive leaves.
    pub fn to_value(&self, resolve: bool, redact: bool) -> Result<Value, Error> {
        if !resolve {
            return Ok(self.raw.clone());
        }
        let resolution = Engine::new(&self.raw, &self.base_path).resolve_root()?;
        let mut value = resolution.value;
        if redact {
            serialize::redact_paths(&mut value, &resolution.sensitive_paths);
        }
        Ok(value)
    }

    pub fn to_yaml(&self, resolve: bool, redact: bool) -> Result<String, Error> {
        serialize::to_yaml_string(&self.to_value(resolve, redact)?)
    }

    pub fn to_json(&self, resolve: bool, redact: bool) -> Result<String, Error> {
        serialize::to_json_string(&self.to_value(resolve, redact)?)
    }

    /// Resolve the whole tree, then validate it with type coercion.
    /// Fails fast on the first violation.
    pub fn validate(&self, schema: &Schema) -> Result<(), Error> {
        let resolved = self.to_value(true, false)?;
        schema::first_violation_error(schema.check(&resolved, Mode::Resolved))
    }

    /// Validate the unresolved tree; strings still carrying interpolation
    /// tokens pass any keyword check.
    pub fn validate_raw(&self, schema: &Schema) -> Result<(), Error> {
        schema::first_violation_error(schema.check(&self.raw, Mode::Raw))
    }

    /// Resolve, then collect every violation instead of failing on the
    /// first. Only resolution itself can error.
    pub fn validate_collect(&self, schema: &Schema) -> Result<Vec<Violation>, Error> {
        let resolved = self.to_value(true, false)?;
        Ok(schema.check(&resolved, Mode::Resolved))
    }
}

fn parse_document(text: &str) -> Result<Value, Error> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
    let value = Value::try_from(doc)?;
    match value {
        Value::Null => Ok(Value::mapping()),
        Value::Mapping(_) => Ok(value),
        other => Err(Error::Parse(format!(
            "document root must be a mapping, got {}",
            other.type_name()
        ))),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if parent != Path::new("") => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn annotate(error: Error, path: &Path) -> Error {
    match error {
        Error::Parse(message) => Error::Parse(format!("{}: {message}", path.display())),
        other => other,
    }
}
