//! Configuration data types for the setup workflow.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Image used when neither the CLI, environment nor file names one.
pub const DEFAULT_IMAGE: &str = "mcr.microsoft.com/mssql/server:2022-latest";

/// Server container configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Reserved container name; same-named containers are replaced.
    pub name: String,

    /// Administrator (`sa`) password passed to the server.
    pub password: String,

    /// First host port probed for the server binding.
    pub base_port: u16,

    /// Last host port probed before giving up.
    pub port_ceiling: u16,

    /// Port the server listens on inside the container.
    pub container_port: u16,

    /// Where the working directory is mounted inside the container.
    pub mount_target: Utf8PathBuf,

    /// Seconds to wait after start before probing the server.
    pub warmup_secs: u64,

    /// Explicit `--platform` value; detected from the host CPU when unset.
    pub platform: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: String::from("tallydb-intern-sql"),
            password: String::from("InternPassword123#"),
            base_port: 1434,
            port_ceiling: 1440,
            container_port: 1433,
            mount_target: Utf8PathBuf::from("/data"),
            warmup_secs: 15,
            platform: None,
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Host the published server port is reachable on.
    pub host: String,

    /// Login used for every connection.
    pub user: String,

    /// Name of the restored database.
    pub name: String,

    /// Substring a driver name must contain to be considered.
    pub driver_filter: String,

    /// Location of the unixODBC driver registry.
    pub odbcinst_path: Utf8PathBuf,

    /// Accept the server's self-signed certificate.
    pub trust_cert: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            user: String::from("sa"),
            name: String::from("TallyDB"),
            driver_filter: String::from("SQL Server"),
            odbcinst_path: Utf8PathBuf::from("/etc/odbcinst.ini"),
            trust_cert: true,
        }
    }
}

/// Connectivity probe budget.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Attempts per driver.
    pub attempts: u32,

    /// Seconds between attempts.
    pub interval_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 6,
            interval_secs: 5,
        }
    }
}

/// Restore and restore-polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Backup file, relative to the working directory unless absolute.
    pub backup_path: Utf8PathBuf,

    /// Verification polls before declaring a timeout.
    pub attempts: u32,

    /// Seconds between verification polls.
    pub interval_secs: u64,

    /// Server error numbers meaning "still restoring".
    pub transient_codes: Vec<u32>,

    /// Message fragments meaning "still restoring".
    pub transient_markers: Vec<String>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            backup_path: Utf8PathBuf::from("tallydb_backup.bak"),
            attempts: 12,
            interval_secs: 5,
            transient_codes: vec![927, 942, 945, 4060],
            transient_markers: vec![
                String::from("middle of a restore"),
                String::from("cannot be opened"),
            ],
        }
    }
}

/// Root application configuration.
///
/// Loaded from configuration files, environment variables and command-line
/// arguments with layered precedence (lowest to highest): defaults,
/// configuration file, environment variables, command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `TALLYDB_CONFIG_PATH` environment variable
/// 2. `.tallydb.toml` in the current working directory
/// 3. `.tallydb.toml` in the home directory
/// 4. `~/.config/tallydb/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "TALLYDB",
    post_merge_hook,
    discovery(
        app_name = "tallydb",
        env_var = "TALLYDB_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".tallydb.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// The SQL Server image to run.
    pub image: Option<String>,

    /// Server container configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub container: ContainerConfig,

    /// Database connection configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub database: DatabaseConfig,

    /// Connectivity probe budget.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub probe: ProbeConfig,

    /// Restore configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub restore: RestoreConfig,
}

impl AppConfig {
    /// The image to run, falling back to [`DEFAULT_IMAGE`].
    #[must_use]
    pub fn image_ref(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }

    /// Checks the merged values for combinations the workflow cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for an empty password, container
    /// name or database name, and `ConfigError::InvalidValue` for zero attempt
    /// budgets or a port ceiling below the base port.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("container.name", self.container.name.as_str()),
            ("container.password", self.container.password.as_str()),
            ("database.name", self.database.name.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                field: (*field).to_owned(),
            }
            .into());
        }

        if self.container.port_ceiling < self.container.base_port {
            return Err(invalid(
                "container.port_ceiling",
                format!(
                    "{} is below base_port {}",
                    self.container.port_ceiling, self.container.base_port
                ),
            ));
        }

        let budgets = [
            ("probe.attempts", self.probe.attempts),
            ("restore.attempts", self.restore.attempts),
        ];
        if let Some((field, _)) = budgets.iter().find(|(_, attempts)| *attempts == 0) {
            return Err(invalid(field, String::from("must be at least 1")));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> crate::error::TallyError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Blank strings from env or files mean "use the default".
        if self.engine_socket.as_deref().is_some_and(|s| s.trim().is_empty()) {
            self.engine_socket = None;
        }
        if self.image.as_deref().is_some_and(|s| s.trim().is_empty()) {
            self.image = None;
        }
        if self
            .container
            .platform
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            self.container.platform = None;
        }
        Ok(())
    }
}
