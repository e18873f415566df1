//! Setup workflow orchestration.
//!
//! [`run_setup`] drives the seven stages in order: prerequisites, client
//! drivers, the server container, the connectivity probe, the restore, the
//! demonstration queries and, on request, the interactive shell. Every
//! external system is reached through a capability trait carried in
//! [`SetupParams`], and all narrative goes through a [`Console`], so the
//! whole workflow runs against mocks in tests.
//!
//! Functions here never print to stdout/stderr directly or call
//! `std::process::exit`; the binary maps the returned error to exit code 1.

mod console;
mod demo;
mod input;
mod shell;

pub use console::Console;
pub use input::threaded_lines;
pub use demo::{
    DEMO_QUERIES, DemoFailure, DemoKind, DemoQuery, DemoReport, MASTER_PREFIX,
    TRANSACTION_PREFIX, run_demo,
};
pub use shell::{EXIT_DIRECTIVES, SHELL_PROMPT, ShellExit, ShellSummary, is_exit_directive, run_shell};

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncBufRead;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::{
    ConnectionParams, DriverCatalog, RestorePlan, SqlConnector, TransientErrorClassifier,
    probe_server, rank_drivers, restore_database, select_driver,
};
use crate::engine::{
    ContainerRuntime, EngineConnector, ImageStatus, LaunchPlan, PortProbe, ServerHandle,
    resolve_platform,
};
use crate::error::{Result as TallyResult, SetupError};
use crate::retry::RetryPolicy;

/// Where client drivers can be downloaded.
pub const DRIVER_DOWNLOAD_URL: &str =
    "https://docs.microsoft.com/en-us/sql/connect/odbc/download-odbc-driver-for-sql-server";

/// External systems and settings used by [`run_setup`].
pub struct SetupParams<'a> {
    /// Merged configuration.
    pub config: &'a AppConfig,
    /// Container engine.
    pub engine: &'a dyn ContainerRuntime,
    /// Engine endpoint, for diagnostics.
    pub engine_endpoint: &'a str,
    /// Host port availability.
    pub ports: &'a dyn PortProbe,
    /// Installed client drivers.
    pub catalog: &'a dyn DriverCatalog,
    /// SQL session factory.
    pub connector: &'a dyn SqlConnector,
    /// Directory bind-mounted into the container.
    pub workdir: &'a Utf8Path,
    /// Host CPU architecture, as in `std::env::consts::ARCH`.
    pub arch: &'a str,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    /// The running server.
    pub server: ServerHandle,
    /// Driver the probe succeeded with.
    pub driver: String,
    /// Base tables present after the restore.
    pub tables: u64,
    /// Demonstration battery results.
    pub demo: DemoReport,
    /// Interactive session, if one was run.
    pub shell: Option<ShellSummary>,
}

/// Stages 1 to 6 completed.
struct Provisioned {
    server: ServerHandle,
    driver: String,
    tables: u64,
    demo: DemoReport,
}

/// Backup location on the host: `configured` as given when absolute,
/// otherwise relative to `workdir`.
#[must_use]
pub fn resolve_backup_path(workdir: &Utf8Path, configured: &Utf8Path) -> Utf8PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workdir.join(configured)
    }
}

/// Connection parameters for the `master` database of a started server.
#[must_use]
pub fn server_params(config: &AppConfig, server: &ServerHandle) -> ConnectionParams {
    ConnectionParams::new(config.database.host.as_str(), server.port)
        .with_credentials(config.database.user.as_str(), server.password.as_str())
        .with_trust_cert(config.database.trust_cert)
}

/// Run the whole setup workflow.
///
/// `interrupt` is called once per interruptible phase and must return a
/// future that resolves when the user interrupts. An interrupt during the
/// shell ends only the shell; anywhere else it aborts the run.
///
/// # Errors
///
/// Returns the error of the first failed stage, `SetupError::Aborted` when
/// the user declines to continue without drivers, and
/// `SetupError::Interrupted` on interrupt.
pub async fn run_setup<R, W, I, F>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    interrupt: I,
) -> TallyResult<SetupOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Fn() -> F,
    F: Future<Output = ()>,
{
    console.header("TallyDB Complete Setup & Access")?;
    console.say("This will start SQL Server, restore TallyDB and run sample queries.")?;

    let provisioned = tokio::select! {
        () = interrupt() => return Err(SetupError::Interrupted.into()),
        result = provision(params, console) => result?,
    };

    print_summary(params, console, &provisioned.server)?;

    let wants_shell = tokio::select! {
        () = interrupt() => return Err(SetupError::Interrupted.into()),
        answer = console.confirm("Want to try interactive query mode?") => answer?,
    };
    let shell = if wants_shell {
        open_shell(params, console, &provisioned, interrupt()).await?
    } else {
        None
    };

    let name = &params.config.container.name;
    console.blank()?;
    console.say("To stop SQL Server later:")?;
    console.say(format_args!("   docker stop {name}"))?;
    console.say(format_args!("   docker rm {name}"))?;

    Ok(SetupOutcome {
        server: provisioned.server,
        driver: provisioned.driver,
        tables: provisioned.tables,
        demo: provisioned.demo,
        shell,
    })
}

async fn provision<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
) -> TallyResult<Provisioned>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let platform = resolve_platform(params.config.container.platform.as_deref(), params.arch);
    check_prerequisites(params, console, platform.as_deref()).await?;
    let installed = check_drivers(params, console).await?;
    let server = start_server(params, console, platform.as_deref()).await?;

    console.step(4, "Connecting to SQL Server")?;
    let probe = &params.config.probe;
    let driver = probe_server(
        params.connector,
        &server_params(params.config, &server),
        &rank_drivers(&installed),
        RetryPolicy::from_secs(probe.attempts, probe.interval_secs),
    )
    .await?;
    console.say(format_args!("Connected successfully using: {driver}"))?;

    let tables = restore(params, console, &server, &driver).await?;

    console.step(6, "Demonstrating Data Access")?;
    let mut session = params
        .connector
        .connect(&database_params(params.config, &server, &driver))
        .await?;
    let demo = run_demo(session.as_mut(), &DEMO_QUERIES, console).await?;
    if !demo.all_succeeded() {
        warn!(failed = demo.failures.len(), "some demonstration queries failed");
    }

    Ok(Provisioned {
        server,
        driver,
        tables,
        demo,
    })
}

fn database_params(config: &AppConfig, server: &ServerHandle, driver: &str) -> ConnectionParams {
    server_params(config, server)
        .with_database(config.database.name.as_str())
        .with_driver(driver)
}

async fn check_prerequisites<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    platform: Option<&str>,
) -> TallyResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.step(1, "Checking Prerequisites")?;
    EngineConnector::health_check_async(params.engine, params.engine_endpoint).await?;
    console.say("Container engine is installed and running")?;

    let image = params.config.image_ref();
    match EngineConnector::ensure_image_async(params.engine, image, platform).await? {
        ImageStatus::AlreadyPresent => console.say(format_args!("{image} already present"))?,
        ImageStatus::Pulled => console.say(format_args!("{image} pulled successfully"))?,
    }
    Ok(())
}

async fn check_drivers<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
) -> TallyResult<Vec<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.step(2, "Checking SQL Server Client Drivers")?;
    let installed = params.catalog.installed_drivers();

    if let Some(best) = select_driver(&installed) {
        console.say(format_args!(
            "Found SQL Server client drivers: {}",
            installed.join(", ")
        ))?;
        console.say(format_args!("Will use: {best}"))?;
        return Ok(installed);
    }

    console.say("No SQL Server client drivers found!")?;
    console.blank()?;
    console.say("REQUIRED: Install Microsoft ODBC Driver for SQL Server")?;
    console.say(format_args!("   Download from: {DRIVER_DOWNLOAD_URL}"))?;
    console.say(format_args!(
        "   Drivers are read from {}",
        params.config.database.odbcinst_path
    ))?;
    console.blank()?;
    if !console.confirm("Do you want to continue anyway?").await? {
        return Err(SetupError::Aborted {
            reason: String::from("no SQL Server client driver installed"),
        }
        .into());
    }
    warn!("continuing without a SQL Server client driver");
    console.say("Continuing without a client driver; connecting is likely to fail")?;
    Ok(installed)
}

async fn start_server<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    platform: Option<&str>,
) -> TallyResult<ServerHandle>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.step(3, "Starting SQL Server")?;
    let container = &params.config.container;
    let plan = LaunchPlan {
        image: params.config.image_ref(),
        container,
        mount_source: params.workdir,
        platform,
    };
    let server = EngineConnector::launch_server_async(params.engine, params.ports, &plan).await?;
    let short_id: String = server.container_id.chars().take(12).collect();
    console.say(format_args!(
        "SQL Server container {short_id} started on port {}",
        server.port
    ))?;

    if container.warmup_secs > 0 {
        console.say(format_args!(
            "Waiting {} seconds for SQL Server to initialize...",
            container.warmup_secs
        ))?;
        tokio::time::sleep(Duration::from_secs(container.warmup_secs)).await;
    }
    info!(port = server.port, "server container running");
    Ok(server)
}

async fn restore<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    server: &ServerHandle,
    driver: &str,
) -> TallyResult<u64>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.step(5, "Restoring TallyDB Database")?;
    let config = params.config;
    let backup = resolve_backup_path(params.workdir, &config.restore.backup_path);
    let plan = RestorePlan::locate(
        config.database.name.as_str(),
        &backup,
        params.workdir,
        &config.container.mount_target,
    )?;
    console.say(format_args!("Found backup file: {}", plan.host_path()))?;
    console.say(format_args!("Restoring {} from backup...", plan.database()))?;

    let tables = restore_database(
        params.connector,
        &server_params(config, server).with_driver(driver),
        &plan,
        &TransientErrorClassifier::from_config(&config.restore),
        RetryPolicy::from_secs(config.restore.attempts, config.restore.interval_secs),
    )
    .await?;

    console.say(format_args!("{} restored successfully!", plan.database()))?;
    console.say(format_args!("Found {tables} tables in the database"))?;
    Ok(tables)
}

fn print_summary<R, W>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    server: &ServerHandle,
) -> TallyResult<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let database = &params.config.database;
    console.header("Setup Complete!")?;
    console.say("SQL Server is running in a container")?;
    console.say(format_args!("{} is restored and accessible", database.name))?;
    console.blank()?;
    console.say("Connection Details:")?;
    console.say(format_args!("   Server: {},{}", database.host, server.port))?;
    console.say(format_args!("   Database: {}", database.name))?;
    console.say(format_args!("   Username: {}", database.user))?;
    console.say(format_args!("   Password: {}", server.password))?;
    console.blank()?;
    Ok(())
}

async fn open_shell<R, W, F>(
    params: &SetupParams<'_>,
    console: &mut Console<R, W>,
    provisioned: &Provisioned,
    interrupt: F,
) -> TallyResult<Option<ShellSummary>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    F: Future<Output = ()>,
{
    console.step(7, "Interactive Query Mode")?;
    let target = database_params(params.config, &provisioned.server, &provisioned.driver);
    match params.connector.connect(&target).await {
        Ok(mut session) => {
            let summary = run_shell(session.as_mut(), console, interrupt).await?;
            Ok(Some(summary))
        }
        Err(error) => {
            warn!(%error, "interactive session could not connect");
            console.say(format_args!("Interactive mode failed: {error}"))?;
            Ok(None)
        }
    }
}
