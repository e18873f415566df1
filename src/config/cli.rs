//! Command-line argument definitions.
//!
//! The workflow runs with no arguments; every flag is an optional override
//! of the layered configuration.

use camino::Utf8PathBuf;
use clap::Parser;

/// Command-line interface for `tallydb-setup`.
#[derive(Debug, Default, Parser)]
#[command(name = "tallydb-setup")]
#[command(
    author,
    version,
    about = "Start SQL Server in a container, restore the TallyDB backup and query it"
)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long)]
    pub engine_socket: Option<String>,

    /// SQL Server image to run.
    #[arg(long)]
    pub image: Option<String>,

    /// Backup file to restore.
    #[arg(long)]
    pub backup: Option<Utf8PathBuf>,
}
