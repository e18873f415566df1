//! Configuration loading with layered precedence.
//!
//! This module loads configuration with the precedence order (lowest to
//! highest): application defaults, configuration file, environment variables,
//! command-line arguments.
//!
//! Layers are composed manually with `MergeComposer` rather than through the
//! derived `load()` so that typed environment variables fail fast. Figment's
//! environment provider silently drops values it cannot parse, which would
//! turn `TALLYDB_CONTAINER_BASE_PORT=abc` into the default port.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g., `TALLYDB_ENGINE_SOCKET`) are always accepted. Typed
//! fields such as `TALLYDB_DATABASE_TRUST_CERT` or `TALLYDB_PROBE_ATTEMPTS`
//! must hold valid values or loading fails with a clear error.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result, TallyError};

/// Value shape accepted from an environment variable.
#[derive(Clone, Copy, Debug)]
enum EnvVarType {
    /// Taken verbatim.
    String,
    /// `true` or `false`.
    Bool,
    /// Unsigned integer no larger than `u16::MAX`.
    U16,
    /// Unsigned integer no larger than `u32::MAX`.
    U32,
    /// Any `u64`.
    U64,
}

impl EnvVarType {
    /// Convert the raw string, naming `var` in any error.
    fn parse(self, var: &str, raw: String) -> Result<Value> {
        let max = match self {
            Self::String => return Ok(Value::String(raw)),
            Self::Bool => {
                return raw
                    .parse::<bool>()
                    .map(Value::Bool)
                    .map_err(|_| invalid_env_value(var, "bool (true/false)", &raw));
            }
            Self::U16 => u64::from(u16::MAX),
            Self::U32 => u64::from(u32::MAX),
            Self::U64 => u64::MAX,
        };
        match raw.parse::<u64>() {
            Ok(n) if n <= max => Ok(Value::Number(n.into())),
            _ => Err(invalid_env_value(
                var,
                &format!("unsigned integer up to {max}"),
                &raw,
            )),
        }
    }
}

fn invalid_env_value(var: &str, expected: &str, raw: &str) -> TallyError {
    ConfigError::InvalidValue {
        field: var.to_owned(),
        reason: format!("expected {expected}, got '{raw}'"),
    }
    .into()
}

/// Every `TALLYDB_*` variable: name, path in the config tree and value shape.
const ENV_VARS: &[(&str, &[&str], EnvVarType)] = &[
    ("TALLYDB_ENGINE_SOCKET", &["engine_socket"], EnvVarType::String),
    ("TALLYDB_IMAGE", &["image"], EnvVarType::String),
    ("TALLYDB_CONTAINER_NAME", &["container", "name"], EnvVarType::String),
    ("TALLYDB_CONTAINER_PASSWORD", &["container", "password"], EnvVarType::String),
    ("TALLYDB_CONTAINER_BASE_PORT", &["container", "base_port"], EnvVarType::U16),
    ("TALLYDB_CONTAINER_PORT_CEILING", &["container", "port_ceiling"], EnvVarType::U16),
    ("TALLYDB_CONTAINER_CONTAINER_PORT", &["container", "container_port"], EnvVarType::U16),
    ("TALLYDB_CONTAINER_MOUNT_TARGET", &["container", "mount_target"], EnvVarType::String),
    ("TALLYDB_CONTAINER_WARMUP_SECS", &["container", "warmup_secs"], EnvVarType::U64),
    ("TALLYDB_CONTAINER_PLATFORM", &["container", "platform"], EnvVarType::String),
    ("TALLYDB_DATABASE_HOST", &["database", "host"], EnvVarType::String),
    ("TALLYDB_DATABASE_USER", &["database", "user"], EnvVarType::String),
    ("TALLYDB_DATABASE_NAME", &["database", "name"], EnvVarType::String),
    ("TALLYDB_DATABASE_DRIVER_FILTER", &["database", "driver_filter"], EnvVarType::String),
    ("TALLYDB_DATABASE_ODBCINST_PATH", &["database", "odbcinst_path"], EnvVarType::String),
    ("TALLYDB_DATABASE_TRUST_CERT", &["database", "trust_cert"], EnvVarType::Bool),
    ("TALLYDB_PROBE_ATTEMPTS", &["probe", "attempts"], EnvVarType::U32),
    ("TALLYDB_PROBE_INTERVAL_SECS", &["probe", "interval_secs"], EnvVarType::U64),
    ("TALLYDB_RESTORE_BACKUP_PATH", &["restore", "backup_path"], EnvVarType::String),
    ("TALLYDB_RESTORE_ATTEMPTS", &["restore", "attempts"], EnvVarType::U32),
    ("TALLYDB_RESTORE_INTERVAL_SECS", &["restore", "interval_secs"], EnvVarType::U64),
];

/// Names of every environment variable the loader reads.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VARS.iter().map(|(name, _, _)| *name).collect()
}

/// Load a configuration file and push it to the composer.
///
/// Opens the parent directory through `cap_std::fs_utf8` and reads the file
/// relative to it.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence.
///
/// Sources, lowest precedence first:
/// 1. Application defaults defined in the structs
/// 2. Configuration file (`--config`, `TALLYDB_CONFIG_PATH` or discovery)
/// 3. Environment variables prefixed with `TALLYDB_`
/// 4. Command-line arguments (from the provided `Cli`)
///
/// The merged result is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError` if configuration loading fails due to:
/// - Malformed configuration files
/// - Invalid typed environment variable values (e.g., a non-numeric
///   `TALLYDB_PROBE_ATTEMPTS`)
/// - Values rejected by [`AppConfig::validate`]
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let config_path: Option<Utf8PathBuf> =
        cli.config.clone().filter(|p| p.exists()).or_else(|| {
            let discovery = ConfigDiscovery::builder("tallydb")
                .env_var("TALLYDB_CONFIG_PATH")
                .config_file_name("config.toml")
                .dotfile_name(".tallydb.toml")
                .build();
            discovery
                .candidates()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Utf8PathBuf::try_from(p).ok())
        });

    if let Some(ref path) = config_path {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;

    Ok(config)
}

/// Collect the set `TALLYDB_*` variables into a JSON tree.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` naming the first typed variable whose
/// value does not parse.
fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();
    for &(name, path, kind) in ENV_VARS {
        if let Ok(raw) = std::env::var(name) {
            insert_at_path(&mut root, path, kind.parse(name, raw)?);
        }
    }
    Ok(if root.is_empty() {
        Value::Null
    } else {
        Value::Object(root)
    })
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert("engine_socket".to_owned(), Value::String(socket.clone()));
    }

    if let Some(ref image) = cli.image {
        overrides.insert("image".to_owned(), Value::String(image.clone()));
    }

    if let Some(ref backup) = cli.backup {
        insert_at_path(
            &mut overrides,
            &["restore", "backup_path"],
            Value::String(backup.to_string()),
        );
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
