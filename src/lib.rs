//! Provision SQL Server in a container and restore the `TallyDB` backup.
//!
//! `tallydb-setup` drives a linear workflow: it checks that the container
//! engine and server image are available, locates a SQL Server client
//! driver, starts the server container on a free local port, waits for the
//! server to answer, restores the backup file from the working directory,
//! runs a battery of demonstration queries and finally offers an interactive
//! SQL shell.
//!
//! # Architecture
//!
//! Every external system sits behind a capability trait:
//! [`engine::ContainerRuntime`] for the Docker or Podman API,
//! [`engine::PortProbe`] for host ports, [`database::DriverCatalog`] for
//! installed drivers and [`database::SqlConnector`] for database sessions.
//! The stages in [`api`] only see these traits, so the production binary
//! wires in `bollard`, `tiberius` and the unixODBC registry while tests use
//! mocks.
//!
//! # Modules
//!
//! - [`api`]: The setup workflow, demonstration queries and interactive shell
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`database`]: Driver discovery, connectivity probe, restore and result rendering
//! - [`engine`]: Container engine connection and server provisioning
//! - [`error`]: Semantic error types for the application
//! - [`logging`]: Diagnostic logging to stderr
//! - [`retry`]: Bounded fixed-interval retries shared by the polling stages

pub mod api;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod logging;
pub mod retry;
