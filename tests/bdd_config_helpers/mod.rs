//! Behavioural test helpers for `tallydb-setup` configuration.

use ortho_config::MergeComposer;
use ortho_config::serde_json::{Value, json};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, then, when};
use tallydb_setup::config::{AppConfig, ContainerConfig, RestoreConfig};
use tallydb_setup::error::{ConfigError, TallyError};

/// State shared across configuration test scenarios.
#[derive(Default, ScenarioState)]
pub struct ConfigState {
    /// The loaded application configuration.
    config: Slot<AppConfig>,
    /// The captured configuration parsing error.
    parse_error: Slot<String>,
    /// File layer JSON value for layer precedence tests.
    file_layer: Slot<Value>,
    /// Environment layer JSON value for layer precedence tests.
    env_layer: Slot<Value>,
    /// CLI layer JSON value for layer precedence tests.
    cli_layer: Slot<Value>,
}

/// Fixture providing a fresh configuration state.
#[fixture]
pub fn config_state() -> ConfigState {
    ConfigState::default()
}

/// Extracts the configuration from state with consistent error handling.
#[expect(clippy::expect_used, reason = "test helper - panics are acceptable")]
fn get_config(config_state: &ConfigState) -> AppConfig {
    config_state
        .config
        .get()
        .expect("configuration should be set")
}

fn set_container(config_state: &ConfigState, container: ContainerConfig) {
    config_state.config.set(AppConfig {
        container,
        ..AppConfig::default()
    });
}

/// Recursively merges two JSON values, combining nested objects field-by-field.
///
/// For non-objects the new value overwrites the existing one, mirroring how
/// `OrthoConfig` merges nested configuration structures.
fn merge_json_values(existing: &Value, new_value: &Value) -> Value {
    match (existing, new_value) {
        (Value::Object(existing_obj), Value::Object(new_obj)) => {
            let mut merged = existing_obj.clone();
            for (key, new_child) in new_obj {
                let child = merged.get(key).map_or_else(
                    || new_child.clone(),
                    |existing_child| merge_json_values(existing_child, new_child),
                );
                merged.insert(key.clone(), child);
            }
            Value::Object(merged)
        }
        _ => new_value.clone(),
    }
}

/// Merges a new value into an existing layer slot (if present).
fn merge_into(slot: &Slot<Value>, new_value: &Value) {
    let merged = slot.get().map_or_else(
        || new_value.clone(),
        |existing| merge_json_values(&existing, new_value),
    );
    slot.set(merged);
}

/// Builds `{ "a": { "b": value } }` from the dotted path `a.b`.
fn nested(path: &str, value: Value) -> Value {
    path.rsplit('.')
        .fold(value, |inner, segment| json!({ segment: inner }))
}

// Defaults, files and validation

#[given("no configuration is provided")]
fn no_configuration_provided(config_state: &ConfigState) {
    config_state.config.set(AppConfig::default());
}

#[given("a configuration file setting the container name to {name}")]
#[expect(clippy::expect_used, reason = "test step - panics are acceptable")]
fn config_file_with_container_name(config_state: &ConfigState, name: String) {
    let contents = format!("[container]\nname = \"{name}\"\n");
    let config = toml::from_str::<AppConfig>(&contents).expect("TOML should parse");
    config_state.config.set(config);
}

#[given("a configuration file with a non-numeric base port")]
#[expect(clippy::expect_used, reason = "test step - panics are acceptable")]
fn config_file_with_bad_port(config_state: &ConfigState) {
    let toml = r#"
        [container]
        base_port = "high"
    "#;
    let error = toml::from_str::<AppConfig>(toml)
        .expect_err("TOML parsing should fail for a non-numeric port");
    config_state.parse_error.set(error.to_string());
}

#[given("a configuration with base port {base} and port ceiling {ceiling}")]
fn config_with_port_range(config_state: &ConfigState, base: u16, ceiling: u16) {
    set_container(
        config_state,
        ContainerConfig {
            base_port: base,
            port_ceiling: ceiling,
            ..ContainerConfig::default()
        },
    );
}

#[given("a configuration with an empty container password")]
fn config_with_empty_password(config_state: &ConfigState) {
    set_container(
        config_state,
        ContainerConfig {
            password: String::new(),
            ..ContainerConfig::default()
        },
    );
}

#[given("a configuration with {attempts} restore attempts")]
fn config_with_restore_attempts(config_state: &ConfigState, attempts: u32) {
    config_state.config.set(AppConfig {
        restore: RestoreConfig {
            attempts,
            ..RestoreConfig::default()
        },
        ..AppConfig::default()
    });
}

#[then("the image is {image}")]
fn image_is(config_state: &ConfigState, image: String) {
    let config = get_config(config_state);
    assert_eq!(config.image_ref(), image, "Expected image to be {image}");
}

#[then("the container name is {name}")]
fn container_name_is(config_state: &ConfigState, name: String) {
    let config = get_config(config_state);
    assert_eq!(config.container.name, name);
}

#[then("host ports range from {base} to {ceiling}")]
fn host_ports_range(config_state: &ConfigState, base: u16, ceiling: u16) {
    let config = get_config(config_state);
    assert_eq!(
        (config.container.base_port, config.container.port_ceiling),
        (base, ceiling)
    );
}

#[then("the backup path is {path}")]
fn backup_path_is(config_state: &ConfigState, path: String) {
    let config = get_config(config_state);
    assert_eq!(config.restore.backup_path.as_str(), path);
}

#[then("the configuration load fails")]
#[expect(clippy::expect_used, reason = "test step - panics are acceptable")]
fn configuration_load_fails(config_state: &ConfigState) {
    let error = config_state
        .parse_error
        .get()
        .expect("parse error should be set");
    assert!(
        error.contains("invalid type"),
        "Expected an invalid-type error, got: {error}"
    );
}

#[then("validation fails for {field}")]
fn validation_fails_for(config_state: &ConfigState, field: String) {
    let config = get_config(config_state);
    match config.validate() {
        Err(
            TallyError::Config(
                ConfigError::MissingRequired { field: reported }
                | ConfigError::InvalidValue {
                    field: reported, ..
                },
            ),
        ) => assert_eq!(reported, field),
        other => panic!("Expected validation to fail for {field}, got: {other:?}"),
    }
}

// Layer precedence

#[given("a file layer provides {path} as {value}")]
fn file_layer_provides(config_state: &ConfigState, path: String, value: String) {
    merge_into(&config_state.file_layer, &nested(&path, layer_value(&value)));
}

#[given("an environment layer provides {path} as {value}")]
fn env_layer_provides(config_state: &ConfigState, path: String, value: String) {
    merge_into(&config_state.env_layer, &nested(&path, layer_value(&value)));
}

#[given("a CLI layer provides {path} as {value}")]
fn cli_layer_provides(config_state: &ConfigState, path: String, value: String) {
    merge_into(&config_state.cli_layer, &nested(&path, layer_value(&value)));
}

/// Numbers stay numbers; everything else is a string.
fn layer_value(raw: &str) -> Value {
    raw.parse::<u64>()
        .map_or_else(|_| Value::String(raw.to_owned()), Value::from)
}

#[when("configuration is merged")]
#[expect(clippy::expect_used, reason = "test step - panics are acceptable")]
fn configuration_is_merged(config_state: &ConfigState) {
    let mut composer = MergeComposer::new();

    let defaults = ortho_config::serde_json::to_value(AppConfig::default())
        .expect("serialization should succeed");
    composer.push_defaults(defaults);

    if let Some(file_layer) = config_state.file_layer.get() {
        composer.push_file(file_layer, None);
    }
    if let Some(env_layer) = config_state.env_layer.get() {
        composer.push_environment(env_layer);
    }
    if let Some(cli_layer) = config_state.cli_layer.get() {
        composer.push_cli(cli_layer);
    }

    let config: AppConfig =
        AppConfig::merge_from_layers(composer.layers()).expect("merge should succeed");
    config_state.config.set(config);
}

#[then("the engine socket is {socket}")]
fn engine_socket_is(config_state: &ConfigState, socket: String) {
    let config = get_config(config_state);
    assert_eq!(config.engine_socket.as_deref(), Some(socket.as_str()));
}

#[then("the probe allows {attempts} attempts")]
fn probe_allows(config_state: &ConfigState, attempts: u32) {
    let config = get_config(config_state);
    assert_eq!(config.probe.attempts, attempts);
}

#[then("the restore interval is {seconds} seconds")]
fn restore_interval_is(config_state: &ConfigState, seconds: u64) {
    let config = get_config(config_state);
    assert_eq!(config.restore.interval_secs, seconds);
}
