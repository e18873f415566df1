//! Semantic error types for the setup workflow.
//!
//! Conditions a caller might inspect or retry are modelled as semantic enums
//! (via `thiserror`). Opaque errors (`eyre::Report`) are reserved for the
//! binary boundary, where every failure becomes a printed diagnostic and a
//! non-zero exit code.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while talking to the container engine.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: Utf8PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: Utf8PathBuf,
    },

    /// Failed to create the async runtime used to drive engine calls.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// A required image could not be pulled.
    #[error("failed to pull image '{image}': {message}")]
    ImagePullFailed {
        /// The image reference.
        image: String,
        /// A description of the pull failure.
        message: String,
    },

    /// An image is still missing after a successful pull.
    #[error("image '{image}' is not available after pulling")]
    ImageMissing {
        /// The image reference.
        image: String,
    },

    /// Every port between the base and the ceiling is taken.
    #[error("no free port available between {base} and {ceiling}")]
    NoPortAvailable {
        /// First port probed.
        base: u16,
        /// Last port probed.
        ceiling: u16,
    },

    /// Failed to create a container.
    #[error("failed to create container: {message}")]
    CreateFailed {
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },
}

/// Errors raised by driver discovery, connections and queries.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// No client driver is installed.
    #[error("no SQL Server client driver available")]
    NoDriverAvailable,

    /// A connection could not be established.
    #[error("failed to connect using '{driver}': {message}")]
    ConnectFailed {
        /// The driver the connection was attempted with.
        driver: String,
        /// A description of the failure.
        message: String,
    },

    /// The server rejected or failed a statement.
    #[error("{message}")]
    Query {
        /// Server error number, when the server reported one.
        code: Option<u32>,
        /// The error text.
        message: String,
    },

    /// Every driver and attempt combination failed the connectivity probe.
    #[error("server did not answer after {attempts} attempts with each of {drivers} driver(s)")]
    ProbeExhausted {
        /// Number of drivers tried.
        drivers: usize,
        /// Attempts made per driver.
        attempts: u32,
    },

    /// The backup file does not exist.
    #[error("backup file not found: {path}")]
    BackupNotFound {
        /// The expected backup location.
        path: Utf8PathBuf,
    },

    /// The backup file lives outside the directory mounted into the container.
    #[error("backup file '{path}' is not inside the mounted directory '{mount}'")]
    BackupOutsideMount {
        /// The backup location.
        path: Utf8PathBuf,
        /// The host directory bind-mounted into the container.
        mount: Utf8PathBuf,
    },

    /// The restored objects did not appear within the wait budget.
    #[error("database restore timed out after {attempts} checks")]
    RestoreTimedOut {
        /// Number of verification polls made.
        attempts: u32,
    },

    /// A query returned a shape the caller did not expect.
    #[error("unexpected query result: {message}")]
    UnexpectedResult {
        /// What was wrong with the result.
        message: String,
    },
}

impl DatabaseError {
    /// Build a query error carrying the server error number.
    #[must_use]
    pub fn query(code: Option<u32>, message: impl Into<String>) -> Self {
        Self::Query {
            code,
            message: message.into(),
        }
    }

    /// Server error number, when one is attached.
    #[must_use]
    pub const fn server_code(&self) -> Option<u32> {
        match self {
            Self::Query { code, .. } => *code,
            _ => None,
        }
    }
}

/// Errors raised by the workflow itself rather than an external system.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The user interrupted the run.
    #[error("setup interrupted by user")]
    Interrupted,

    /// The user declined to continue.
    #[error("setup aborted: {reason}")]
    Aborted {
        /// Why the run stopped.
        reason: String,
    },

    /// Console input or output failed.
    #[error("console I/O failed: {message}")]
    Console {
        /// A description of the I/O failure.
        message: String,
    },

    /// The working directory cannot be used as the mount source.
    #[error("working directory is unusable: {message}")]
    WorkingDirectory {
        /// A description of the failure.
        message: String,
    },
}

/// Top-level error type for the setup workflow.
///
/// Aggregates every domain error. At the binary boundary these are converted
/// to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum TallyError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred talking to the database.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The workflow itself failed.
    #[error(transparent)]
    Setup(#[from] SetupError),
}

/// A specialised `Result` type for setup operations.
pub type Result<T> = std::result::Result<T, TallyError>;
