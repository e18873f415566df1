//! Configuration system for `tallydb-setup`.
//!
//! This module provides the configuration structures and CLI definitions.
//! Loading and precedence merging is handled by the `ortho_config` crate:
//! CLI flags override environment variables, which override configuration
//! files, which override defaults.
//!
//! The configuration file is expected at `~/.config/tallydb/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//! image = "mcr.microsoft.com/mssql/server:2022-latest"
//!
//! [container]
//! name = "tallydb-intern-sql"
//! password = "InternPassword123#"
//! base_port = 1434
//! port_ceiling = 1440
//!
//! [database]
//! name = "TallyDB"
//! odbcinst_path = "/etc/odbcinst.ini"
//!
//! [probe]
//! attempts = 6
//! interval_secs = 5
//!
//! [restore]
//! backup_path = "tallydb_backup.bak"
//! attempts = 12
//! interval_secs = 5
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::Cli;
pub use loader::{env_var_names, load_config};
pub use types::{
    AppConfig, ContainerConfig, DEFAULT_IMAGE, DatabaseConfig, ProbeConfig, RestoreConfig,
};
