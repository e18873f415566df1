//! Container engine connection and server provisioning.
//!
//! This module provides the interface for connecting to Docker or Podman
//! container engines and for running the database server container. The
//! socket endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `TALLYDB_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. `PODMAN_HOST` environment variable
//! 7. Platform default (`/var/run/docker.sock` on Unix)

mod connection;
mod image;
mod port;
mod runtime;
mod supervisor;


pub use connection::{EngineConnector, SocketResolver};
pub use image::ImageStatus;
pub use port::{PortProbe, TcpPortProbe, select_port};

#[cfg(test)]
pub use port::MockPortProbe;
pub use runtime::{ContainerRuntime, EngineFuture, is_not_found};
pub use supervisor::{
    LaunchPlan, ServerContainerRequest, ServerHandle, platform_for_arch, resolve_platform,
};
