//! Engine endpoint resolution and client construction.

mod error_classification;
mod health_check;

use bollard::Docker;

use crate::error::{ContainerError, TallyError};

/// Engine variables consulted after the configured socket, highest priority first.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Connection timeout in seconds for Docker/Podman API requests.
///
/// Image pulls run through the same client, so this stays generous.
const CONNECTION_TIMEOUT_SECS: u64 = 600;

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Default socket path for Unix platforms.
#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Default socket path for Windows platforms.
#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Looks up the engine endpoint in the variables Docker and Podman clients
/// honour.
///
/// Generic over `mockable::Env` so resolution can be driven from a mock.
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Wrap an environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// First non-empty value of `DOCKER_HOST`, `CONTAINER_HOST` or
    /// `PODMAN_HOST`, in that order.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|name| self.env.string(name))
            .find(|value| !value.is_empty())
    }

    /// Engine endpoint used when nothing else is configured.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// How an endpoint string is dialled.
#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    /// Unix socket or named pipe URI.
    Local(String),
    /// HTTP or HTTPS URL.
    Remote(String),
}

impl Endpoint {
    /// `tcp://` becomes `http://`. Bare paths starting with `//` or `\\`
    /// are named pipes and any other bare path is a Unix socket.
    fn parse(socket: &str) -> Self {
        match socket.split_once("://") {
            Some(("unix" | "npipe", _)) => Self::Local(socket.to_owned()),
            Some(("http" | "https", _)) => Self::Remote(socket.to_owned()),
            Some(("tcp", address)) => Self::Remote(format!("http://{address}")),
            _ if socket.starts_with("//") || socket.starts_with("\\\\") => {
                Self::Local(format!("npipe://{socket}"))
            }
            _ => Self::Local(format!("unix://{socket}")),
        }
    }
}

/// Entry point for talking to the Docker or Podman engine.
pub struct EngineConnector;

impl EngineConnector {
    /// Build a Bollard client for `socket`.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://`, `http://` and `https://`
    /// endpoints as well as bare socket paths. Bollard dials lazily, so an
    /// unreachable engine only shows up at the first request (see
    /// [`Self::health_check_async`]).
    ///
    /// # Errors
    ///
    /// Returns a classified `ContainerError` if the client cannot be
    /// configured for the endpoint.
    pub fn connect(socket: &str) -> Result<Docker, TallyError> {
        let client = match Endpoint::parse(socket) {
            Endpoint::Local(uri) => Docker::connect_with_socket(
                &uri,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            Endpoint::Remote(url) => Docker::connect_with_http(
                &url,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
        };
        client.map_err(|e| error_classification::classify_connection_error(&e, socket).into())
    }

    /// Pick the engine endpoint.
    ///
    /// `config_socket` (CLI, config file or `TALLYDB_ENGINE_SOCKET`) wins,
    /// then the engine variables read by `resolver`, then the platform
    /// default. Empty values are skipped at every level.
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }

    /// Build the multi-threaded Tokio runtime the binary runs on.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the runtime cannot
    /// be built.
    pub fn create_runtime() -> Result<tokio::runtime::Runtime, TallyError> {
        tokio::runtime::Runtime::new().map_err(|e| {
            TallyError::from(ContainerError::RuntimeCreationFailed {
                message: e.to_string(),
            })
        })
    }
}
