use std::collections::BTreeMap;
use strata::{register_resolver, Config, Error, FileSpec, ResolvedValue, Schema, Value};

fn parse_value(text: &str) -> Value {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
    Value::try_from(doc).unwrap()
}

#[test]
fn test_env_and_self_reference_end_to_end() {
    std::env::set_var("IT_DB_PORT", "5432");

    let text = r#"
db:
  host: h
  port: "${env:IT_DB_PORT}"
  url: "postgres://${db.host}:${db.port}"
"#;
    let mut config = Config::loads(text, None).unwrap();

    assert_eq!(
        config.get("db.url").unwrap(),
        Value::from("postgres://h:5432")
    );
    // Without a schema the resolved port stays a string.
    assert_eq!(config.get("db.port").unwrap(), Value::from("5432"));

    config.set_schema(
        Schema::from_yaml(
            r#"
type: object
properties:
  db:
    type: object
    properties:
      port:
        type: integer
"#,
        )
        .unwrap(),
    );
    assert_eq!(config.get("db.port").unwrap(), Value::Int(5432));

    std::env::remove_var("IT_DB_PORT");
}

#[test]
fn test_cycle_mentions_every_member() {
    let config = Config::loads("a: \"${b}\"\nb: \"${a}\"\n", None).unwrap();
    let err = config.get("a").unwrap_err();
    let Error::Circular(cycle) = err else {
        panic!("expected a circular reference error, got {err:?}");
    };
    assert!(cycle.contains('a'), "cycle should mention a: {cycle}");
    assert!(cycle.contains('b'), "cycle should mention b: {cycle}");
}

#[test]
fn test_sensitive_values_redact_in_yaml_output() {
    register_resolver(
        "it_vault",
        |_arg: &str, _kwargs: &BTreeMap<String, String>| {
            Ok(ResolvedValue::sensitive("s3cr3t"))
        },
        false,
    )
    .unwrap();

    let config = Config::loads("password: \"${it_vault:k}\"\n", None).unwrap();

    let redacted = config.to_yaml(true, true).unwrap();
    assert!(redacted.contains("***REDACTED***"), "{redacted}");
    assert!(!redacted.contains("s3cr3t"), "{redacted}");

    let plain = config.to_yaml(true, false).unwrap();
    assert!(plain.contains("s3cr3t"), "{plain}");

    // Unresolved output keeps the token text and nothing leaks.
    let raw = config.to_yaml(false, false).unwrap();
    assert!(raw.contains("${it_vault:k}"), "{raw}");
}

#[test]
fn test_merge_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.yaml");
    let second = dir.path().join("second.yaml");
    std::fs::write(&first, "a:\n  x: 1\n  y: 2\n").unwrap();
    std::fs::write(&second, "a:\n  y: 20\n  z: 30\n").unwrap();

    let config = Config::load_merged(&[&first, &second]).unwrap();
    assert_eq!(
        config.get("a").unwrap(),
        parse_value("{x: 1, y: 20, z: 30}")
    );
    assert_eq!(config.base_path(), dir.path());
}

#[test]
fn test_optional_missing_file_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(&a, "x: 1\nshared: a\n").unwrap();
    std::fs::write(&b, "y: 2\nshared: b\n").unwrap();

    let with_missing = Config::load_merged_with_specs(&[
        FileSpec::required(&a),
        FileSpec::optional(dir.path().join("missing.yaml")),
        FileSpec::required(&b),
    ])
    .unwrap();
    let without = Config::load_merged(&[&a, &b]).unwrap();
    assert_eq!(with_missing.raw(), without.raw());

    // A missing required file still fails the load.
    let err = Config::load_merged_with_specs(&[
        FileSpec::required(&a),
        FileSpec::required(dir.path().join("missing.yaml")),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_resolved_json_round_trips() {
    std::env::set_var("IT_ROUND_TRIP", "42");
    let config = Config::loads(
        "name: app\ncount: \"${env:IT_ROUND_TRIP}\"\nnested:\n  flag: true\n",
        None,
    )
    .unwrap();
    let resolved = config.to_value(true, false).unwrap();
    let reparsed = parse_value(&config.to_json(true, false).unwrap());
    assert_eq!(reparsed, resolved);
    std::env::remove_var("IT_ROUND_TRIP");
}

#[test]
fn test_file_include_substitutes_structure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extra.yaml"), "region: eu-1\nzones: [a, b]\n").unwrap();
    std::fs::write(dir.path().join("motd.txt"), "welcome").unwrap();
    std::fs::write(
        dir.path().join("main.yaml"),
        "aws: \"${file:extra.yaml}\"\nbanner: \"note: ${file:motd.txt}\"\n",
    )
    .unwrap();

    let config = Config::load(dir.path().join("main.yaml")).unwrap();
    assert_eq!(
        config.get("aws").unwrap(),
        parse_value("{region: eu-1, zones: [a, b]}")
    );
    assert_eq!(config.get("banner").unwrap(), Value::from("note: welcome"));
}

#[test]
fn test_default_kwarg_recovers_not_found_only() {
    let config = Config::loads(
        "v: \"${env:IT_SURELY_UNSET_VAR,default=fallback}\"\n",
        None,
    )
    .unwrap();
    assert_eq!(config.get("v").unwrap(), Value::from("fallback"));

    let config = Config::loads("v: \"${env:IT_SURELY_UNSET_VAR}\"\n", None).unwrap();
    assert!(matches!(config.get("v").unwrap_err(), Error::Resolver(_)));
}
