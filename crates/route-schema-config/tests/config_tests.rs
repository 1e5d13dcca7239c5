use pretty_assertions::assert_eq;
use route_schema_config::{
    ConfigError, FilterRule, FreezeRule, RouteSchemaConfig, SchemaKey,
    load_from_path, load_from_str,
};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;

fn write_temp(contents: &str) -> tempfile::TempPath {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    f.write_all(contents.as_bytes()).expect("write");
    f.into_temp_path()
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn empty_document_yields_defaults() {
    let cfg = load_from_str("").expect("empty config");
    assert_eq!(cfg, RouteSchemaConfig::default());

    assert!(cfg.cache);
    assert_eq!(cfg.cache_path, PathBuf::from("./route-schemas.cache"));
    assert_eq!(cfg.max_properties(SchemaKey::Query), 30);
    assert_eq!(cfg.max_properties(SchemaKey::Body), 80);
    assert_eq!(cfg.max_properties(SchemaKey::Reaction), 120);
    for key in SchemaKey::ALL {
        assert_eq!(cfg.key(key).number_of_instances, 500);
        assert_eq!(cfg.key(key).number_of_days, 7);
    }
    assert!(cfg.freeze_strategy.is_none());
    assert!(cfg.filter_whitelist_strategy.is_empty());
}

#[test]
fn partial_key_block_keeps_key_specific_cap() {
    let cfg = load_from_str(
        r#"
query:
  NUMBER_OF_DAYS: 3
"#,
    )
    .expect("parse");

    assert_eq!(cfg.query.number_of_days, 3);
    assert_eq!(cfg.query.number_of_instances, 500);
    assert_eq!(cfg.max_properties(SchemaKey::Query), 30);
}

#[test]
fn key_mut_overrides_a_single_key() {
    let mut cfg = RouteSchemaConfig::default();
    cfg.key_mut(SchemaKey::Body).max_properties = Some(5);
    cfg.key_mut(SchemaKey::Reaction).number_of_days = 1;

    assert_eq!(cfg.max_properties(SchemaKey::Body), 5);
    assert_eq!(cfg.max_properties(SchemaKey::Query), 30);
    assert_eq!(cfg.reaction.number_of_days, 1);
    assert_eq!(cfg.body.number_of_days, 7);
}

// ============================================================================
// Full parsing
// ============================================================================

#[test]
#[serial]
#[allow(unsafe_code)]
fn parses_full_config_with_env_expansion() {
    unsafe {
        std::env::set_var("ROUTE_SCHEMA_CACHE", "/var/lib/app/schemas.json");
    }

    let yaml = r#"
cache: true
cachePath: ${ROUTE_SCHEMA_CACHE}
query:
  MAX_PROPERTIES: 10
body:
  max_properties: 40
  number_of_instances: 1000
reaction:
  NUMBER_OF_INSTANCES: 250
  NUMBER_OF_DAYS: 1
freezeStrategy:
  - type: instance_count
    at_least: 2
  - type: age_days
    at_least: 14
filterWhitelistStrategy:
  - type: exclude
    patterns: ["*.password", "debug%"]
  - type: min_count
    at_least: 3
"#;

    let path = write_temp(yaml);
    let cfg = load_from_path(&path).expect("parse yaml");

    assert_eq!(cfg.cache_path, PathBuf::from("/var/lib/app/schemas.json"));
    assert_eq!(cfg.max_properties(SchemaKey::Query), 10);
    assert_eq!(cfg.max_properties(SchemaKey::Body), 40);
    assert_eq!(cfg.body.number_of_instances, 1000);
    assert_eq!(cfg.max_properties(SchemaKey::Reaction), 120);
    assert_eq!(cfg.reaction.number_of_instances, 250);
    assert_eq!(cfg.reaction.number_of_days, 1);

    assert_eq!(
        cfg.freeze_strategy,
        Some(vec![
            FreezeRule::InstanceCount { at_least: 2 },
            FreezeRule::AgeDays { at_least: 14 },
        ])
    );
    assert_eq!(
        cfg.filter_whitelist_strategy,
        vec![
            FilterRule::Exclude {
                patterns: vec!["*.password".into(), "debug%".into()],
            },
            FilterRule::MinCount { at_least: 3 },
        ]
    );
}

#[test]
fn cache_can_be_disabled() {
    let cfg = load_from_str("cache: false").expect("parse");
    assert!(!cfg.cache);
    assert_eq!(cfg, RouteSchemaConfig::uncached());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn invalid_yaml_returns_parse_error() {
    let path = write_temp("cache: [unterminated");
    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn unknown_rule_type_is_rejected() {
    let err = load_from_str(
        r#"
freeze_strategy:
  - type: phase_of_moon
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn missing_file_returns_io_error() {
    let err = load_from_path("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
