//! Process-wide resolver registry.
//!
//! Bindings and plugins register resolvers at startup from independent
//! crates, so the registry is a single global created on first use. The
//! built-in `env` and `file` resolvers are always present; self-references
//! are handled by the resolution engine and never appear here.

use crate::error::Error;
use crate::interp;
use crate::value::ResolvedValue;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

/// How a resolver signals failure. `NotFound` is the only kind the engine
/// recovers from (via the `default=` kwarg); everything else surfaces as a
/// resolver error at the access that needed the value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverFailure {
    NotFound(String),
    Failed(String),
}

/// Contract for pluggable resolvers: a re-entrant callable from a token
/// argument plus forwarded kwargs to a value. Implementations must not
/// mutate the calling configuration; if a lookup is expensive they cache
/// internally, the engine never does.
pub trait ResolverFn: Send + Sync {
    fn call(
        &self,
        arg: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<ResolvedValue, ResolverFailure>;
}

impl<F> ResolverFn for F
where
    F: Fn(&str, &BTreeMap<String, String>) -> Result<ResolvedValue, ResolverFailure>
        + Send
        + Sync,
{
    fn call(
        &self,
        arg: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Result<ResolvedValue, ResolverFailure> {
        self(arg, kwargs)
    }
}

/// Registry entry. Built-ins are tagged variants so the engine can supply
/// the context they need (the `file` resolver reads relative to the owning
/// config's base path); user resolvers are opaque callables.
#[derive(Clone)]
pub enum Resolver {
    Env,
    File,
    External(Arc<dyn ResolverFn>),
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolver::Env => write!(f, "Resolver::Env"),
            Resolver::File => write!(f, "Resolver::File"),
            Resolver::External(_) => write!(f, "Resolver::External"),
        }
    }
}

fn builtin_resolvers() -> HashMap<String, Resolver> {
    let mut map = HashMap::new();
    map.insert("env".to_string(), Resolver::Env);
    map.insert("file".to_string(), Resolver::File);
    map
}

fn registry() -> &'static RwLock<HashMap<String, Resolver>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Resolver>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(builtin_resolvers()))
}

/// Register a resolver under `name`. Registering an existing name is a
/// no-op unless `force` is set, so independent packages can both call this
/// at startup. Names are restricted to `[A-Za-z_][A-Za-z0-9_]*`; anything
/// else (notably names with `.` or `-`) could shadow a self-reference and
/// is rejected here.
pub fn register_resolver(
    name: &str,
    resolver: impl ResolverFn + 'static,
    force: bool,
) -> Result<(), Error> {
    register(name, Resolver::External(Arc::new(resolver)), force)
}

pub(crate) fn register(name: &str, resolver: Resolver, force: bool) -> Result<(), Error> {
    if !interp::is_valid_name(name) {
        return Err(Error::Resolver(format!(
            "invalid resolver name '{name}': must match [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    let mut map = registry().write().unwrap_or_else(|e| e.into_inner());
    if map.contains_key(name) && !force {
        debug!("resolver '{name}' already registered, keeping existing");
        return Ok(());
    }
    debug!("registering resolver '{name}'");
    map.insert(name.to_string(), resolver);
    Ok(())
}

/// Current resolver for `name`, if any.
pub fn lookup(name: &str) -> Option<Resolver> {
    registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(name)
        .cloned()
}

/// Restore the registry to just the built-ins. Test isolation hook.
pub fn reset_registry() {
    let mut map = registry().write().unwrap_or_else(|e| e.into_inner());
    *map = builtin_resolvers();
    debug!("resolver registry reset to built-ins");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn constant(value: &'static str) -> impl ResolverFn {
        move |_arg: &str, _kwargs: &BTreeMap<String, String>| {
            Ok(ResolvedValue::new(Value::from(value)))
        }
    }

    #[test]
    fn test_builtins_present() {
        assert!(matches!(lookup("env"), Some(Resolver::Env)));
        assert!(matches!(lookup("file"), Some(Resolver::File)));
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_registration_is_idempotent() {
        register_resolver("reg_idem", constant("first"), false).unwrap();
        register_resolver("reg_idem", constant("second"), false).unwrap();
        let resolver = lookup("reg_idem").unwrap();
        let Resolver::External(f) = resolver else {
            panic!("expected external resolver");
        };
        let result = f.call("", &BTreeMap::new()).unwrap();
        assert_eq!(result.value, Value::from("first"));
    }

    #[test]
    fn test_force_replaces() {
        register_resolver("reg_force", constant("first"), false).unwrap();
        register_resolver("reg_force", constant("second"), true).unwrap();
        let Some(Resolver::External(f)) = lookup("reg_force") else {
            panic!("expected external resolver");
        };
        let result = f.call("", &BTreeMap::new()).unwrap();
        assert_eq!(result.value, Value::from("second"));
    }

    #[test]
    fn test_path_like_names_rejected() {
        let err = register_resolver("db.host", constant("x"), false).unwrap_err();
        assert!(err.to_string().contains("invalid resolver name"));
        let err = register_resolver("my-resolver", constant("x"), false).unwrap_err();
        assert!(err.to_string().contains("invalid resolver name"));
    }
}
