//! `tallydb-setup` application entry point.
//!
//! Provisions a SQL Server container, restores the `TallyDB` backup from the
//! working directory, runs sample queries and offers an interactive shell.
//! It uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports and a
//! non-zero exit code.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/tallydb/config.toml` or path from `TALLYDB_CONFIG_PATH`)
//! 3. Environment variables (`TALLYDB_*`)
//! 4. Command-line arguments

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tallydb_setup::api::{Console, SetupOutcome, SetupParams, run_setup, threaded_lines};
use tallydb_setup::config::{AppConfig, Cli, load_config};
use tallydb_setup::database::{OdbcInstCatalog, TdsConnector};
use tallydb_setup::engine::{EngineConnector, SocketResolver, TcpPortProbe};
use tallydb_setup::error::{Result as TallyResult, SetupError};
use tallydb_setup::logging::init_stderr_logging;
use tracing::{info, warn};

/// Application entry point.
///
/// Loads configuration with layered precedence via `OrthoConfig`, then runs
/// the setup workflow to completion on a Tokio runtime.
fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    init_stderr_logging();

    // Load configuration with layered precedence: defaults < file < env < CLI.
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = EngineConnector::create_runtime().map_err(Report::from)?;
    let outcome = runtime.block_on(run(&config)).map_err(Report::from)?;
    info!(
        port = outcome.server.port,
        tables = outcome.tables,
        "setup finished"
    );
    Ok(())
}

/// Wire the production capabilities together and run the workflow.
async fn run(config: &AppConfig) -> TallyResult<SetupOutcome> {
    let workdir = working_directory()?;

    let env = DefaultEnv::new();
    let resolver = SocketResolver::new(&env);
    let endpoint = EngineConnector::resolve_socket(config.engine_socket.as_deref(), &resolver);
    let docker = EngineConnector::connect(&endpoint)?;

    let catalog = OdbcInstCatalog::new(
        config.database.odbcinst_path.clone(),
        config.database.driver_filter.as_str(),
    );
    let connector = TdsConnector::new();
    let params = SetupParams {
        config,
        engine: &docker,
        engine_endpoint: &endpoint,
        ports: &TcpPortProbe,
        catalog: &catalog,
        connector: &connector,
        workdir: &workdir,
        arch: std::env::consts::ARCH,
    };

    let stdin = std::io::BufReader::new(std::io::stdin());
    let input = threaded_lines(stdin).map_err(|e| SetupError::Console {
        message: format!("cannot start the input reader: {e}"),
    })?;
    let mut console = Console::new(input, std::io::stdout());
    run_setup(&params, &mut console, interrupted).await
}

/// Current directory, which is bind-mounted into the server container.
fn working_directory() -> TallyResult<Utf8PathBuf> {
    let current = std::env::current_dir().map_err(|e| SetupError::WorkingDirectory {
        message: e.to_string(),
    })?;
    Utf8PathBuf::from_path_buf(current).map_err(|path| {
        SetupError::WorkingDirectory {
            message: format!("{} is not valid UTF-8", path.display()),
        }
        .into()
    })
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "interrupt handler unavailable");
        std::future::pending::<()>().await;
    }
}
