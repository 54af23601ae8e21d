use std::io::Write;

use graphrun_core::config::AppConfig;
use graphrun_core::graph::GraphDefinition;
use graphrun_core::GraphrunError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write toml");
    tmp
}

#[test]
fn test_load_full_config_from_file() {
    let tmp = write_config(
        r#"
[engine]
default_max_steps = 40

[gateway]
bind = "0.0.0.0:9999"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.engine.default_max_steps, 40);
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("GRAPHRUN_TEST_BIND", "10.0.0.1:7000");

    let tmp = write_config(
        r#"
[gateway]
bind = "${GRAPHRUN_TEST_BIND}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.gateway.bind, "10.0.0.1:7000");

    std::env::remove_var("GRAPHRUN_TEST_BIND");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let tmp = write_config("");
    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.engine.default_max_steps, 500);
    assert_eq!(config.gateway.bind, "127.0.0.1:8000");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let tmp = write_config("[engine\ndefault_max_steps = ");
    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, GraphrunError::Config(_)));
}

#[test]
fn test_default_max_steps_applies_to_graphs() {
    let tmp = write_config("[engine]\ndefault_max_steps = 12\n");
    let config = AppConfig::load(tmp.path()).expect("load config");

    let definition: GraphDefinition = serde_json::from_str(
        r#"{"nodes": {"a": {"name": "a", "func": "f"}}, "edges": {}, "entrypoint": "a"}"#,
    )
    .expect("parse graph");
    let graph = definition.into_graph(config.engine.default_max_steps);
    assert_eq!(graph.max_steps, 12);
}
