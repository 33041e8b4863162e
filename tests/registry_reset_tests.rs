// Runs as its own test binary so resetting the process-wide registry
// cannot race other tests' registrations.

use std::collections::BTreeMap;
use strata::{register_resolver, reset_registry, Config, Error, ResolvedValue};

#[test]
fn test_reset_restores_builtins_only() {
    register_resolver(
        "ephemeral",
        |_arg: &str, _kwargs: &BTreeMap<String, String>| Ok(ResolvedValue::new("x")),
        false,
    )
    .unwrap();

    let config = Config::loads("v: \"${ephemeral:arg}\"\n", None).unwrap();
    assert_eq!(config.get("v").unwrap().as_str(), Some("x"));

    reset_registry();

    // The custom resolver is gone...
    let err = config.get("v").unwrap_err();
    assert!(matches!(err, Error::Resolver(_)));

    // ...but the built-ins survive.
    std::env::set_var("REGISTRY_RESET_VAR", "still-here");
    let config = Config::loads("v: \"${env:REGISTRY_RESET_VAR}\"\n", None).unwrap();
    assert_eq!(config.get("v").unwrap().as_str(), Some("still-here"));
    std::env::remove_var("REGISTRY_RESET_VAR");
}
