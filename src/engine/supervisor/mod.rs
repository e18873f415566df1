//! Server container launch and replacement.
//!
//! This module translates the `[container]` settings into `Bollard`
//! container-create payloads, replaces any container holding the reserved
//! name, and starts the server on the first free host port.

use std::collections::HashMap;

use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{CreateContainerOptions, CreateContainerOptionsBuilder};
use camino::Utf8Path;
use tracing::{debug, info, warn};

use super::port::{PortProbe, select_port};
use super::runtime::{ContainerRuntime, is_not_found};
use super::EngineConnector;
use crate::config::ContainerConfig;
use crate::error::{ConfigError, ContainerError, TallyError};

const EMULATED_PLATFORM: &str = "linux/amd64";
const HOST_BIND_ADDRESS: &str = "0.0.0.0";

/// Platform to request for a host CPU architecture.
///
/// The server image is published for `amd64` only, so ARM hosts run it
/// under emulation.
#[must_use]
pub fn platform_for_arch(arch: &str) -> Option<&'static str> {
    matches!(arch, "aarch64" | "arm64").then_some(EMULATED_PLATFORM)
}

/// Platform to use: an explicit override wins over detection.
#[must_use]
pub fn resolve_platform(configured: Option<&str>, arch: &str) -> Option<String> {
    configured
        .filter(|value| !value.trim().is_empty())
        .map(String::from)
        .or_else(|| platform_for_arch(arch).map(String::from))
}

/// Server container request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContainerRequest {
    image: String,
    name: String,
    env: Vec<String>,
    port_binding: Option<(u16, u16)>,
    bind: Option<String>,
    platform: Option<String>,
}

impl ServerContainerRequest {
    /// Create a request for `image` under the reserved container `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when either value is empty or
    /// whitespace-only.
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Result<Self, TallyError> {
        let image_value = image.into();
        let name_value = name.into();

        Ok(Self {
            image: String::from(require("image", &image_value)?),
            name: String::from(require("container.name", &name_value)?),
            env: Vec::new(),
            port_binding: None,
            bind: None,
            platform: None,
        })
    }

    /// Accept the licence and set the administrator password.
    ///
    /// Both the current and the legacy password variable are set so older
    /// image tags pick it up too.
    #[must_use]
    pub fn with_sa_password(mut self, password: &str) -> Self {
        self.env = vec![
            String::from("ACCEPT_EULA=Y"),
            format!("MSSQL_SA_PASSWORD={password}"),
            format!("SA_PASSWORD={password}"),
        ];
        self
    }

    /// Publish `container_port` on `host_port`.
    #[must_use]
    pub const fn with_port_binding(mut self, host_port: u16, container_port: u16) -> Self {
        self.port_binding = Some((host_port, container_port));
        self
    }

    /// Bind-mount a host directory into the container.
    #[must_use]
    pub fn with_bind_mount(mut self, source: &Utf8Path, target: &Utf8Path) -> Self {
        self.bind = Some(format!("{source}:{target}"));
        self
    }

    /// Request a specific platform, e.g. `linux/amd64`.
    #[must_use]
    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform.filter(|value| !value.trim().is_empty());
        self
    }

    /// Return the configured image.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Return the container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the environment entries in `KEY=value` form.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Return the `(host, container)` port pair.
    #[must_use]
    pub const fn port_binding(&self) -> Option<(u16, u16)> {
        self.port_binding
    }

    /// Return the `source:target` bind specification.
    #[must_use]
    pub fn bind(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    /// Return the requested platform.
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }
}

/// A started server container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    /// Engine-assigned container ID.
    pub container_id: String,
    /// Host port the server is published on.
    pub port: u16,
    /// Administrator password the server was started with.
    pub password: String,
}

/// Inputs for [`EngineConnector::launch_server_async`].
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlan<'a> {
    /// Image to run.
    pub image: &'a str,
    /// Container settings.
    pub container: &'a ContainerConfig,
    /// Host directory mounted at `container.mount_target`.
    pub mount_source: &'a Utf8Path,
    /// Platform to request, if any.
    pub platform: Option<&'a str>,
}

impl EngineConnector {
    /// Stop and remove the container called `name`, ignoring failures.
    ///
    /// A missing container is the common case and is not logged as a
    /// problem.
    pub async fn remove_existing_async<R: ContainerRuntime + ?Sized>(runtime: &R, name: &str) {
        if let Err(error) = runtime.stop_container(name).await
            && !is_not_found(&error)
        {
            debug!(container = name, %error, "stop before replace failed");
        }
        match runtime.remove_container(name).await {
            Ok(()) => info!(container = name, "removed previous container"),
            Err(error) if is_not_found(&error) => {}
            Err(error) => warn!(container = name, %error, "could not remove previous container"),
        }
    }

    /// Create and start a container from `request`, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// create request, and `ContainerError::StartFailed` when it will not
    /// start the container.
    pub async fn create_and_start_async<R: ContainerRuntime + ?Sized>(
        runtime: &R,
        request: &ServerContainerRequest,
    ) -> Result<String, TallyError> {
        let container_id = runtime
            .create_container(Some(build_create_options(request)), build_create_body(request))
            .await
            .map_err(|error| {
                TallyError::from(ContainerError::CreateFailed {
                    message: error.to_string(),
                })
            })?;

        runtime
            .start_container(&container_id)
            .await
            .map_err(|error| {
                TallyError::from(ContainerError::StartFailed {
                    container_id: container_id.clone(),
                    message: error.to_string(),
                })
            })?;

        Ok(container_id)
    }

    /// Replace any same-named container and start the server on a free port.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NoPortAvailable` when every port from
    /// `base_port` to `port_ceiling` is taken, plus the errors of
    /// [`Self::create_and_start_async`].
    pub async fn launch_server_async<R, P>(
        runtime: &R,
        ports: &P,
        plan: &LaunchPlan<'_>,
    ) -> Result<ServerHandle, TallyError>
    where
        R: ContainerRuntime + ?Sized,
        P: PortProbe + ?Sized,
    {
        let container = plan.container;
        Self::remove_existing_async(runtime, &container.name).await;

        let port = select_port(ports, container.base_port, container.port_ceiling)?;
        info!(port, "selected host port");

        let request = ServerContainerRequest::new(plan.image, container.name.as_str())?
            .with_sa_password(&container.password)
            .with_port_binding(port, container.container_port)
            .with_bind_mount(plan.mount_source, &container.mount_target)
            .with_platform(plan.platform.map(String::from));

        let container_id = Self::create_and_start_async(runtime, &request).await?;

        Ok(ServerHandle {
            container_id,
            port,
            password: container.password.clone(),
        })
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, TallyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TallyError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }
    Ok(trimmed)
}

fn build_create_options(request: &ServerContainerRequest) -> CreateContainerOptions {
    let builder = CreateContainerOptionsBuilder::new().name(request.name());
    match request.platform() {
        Some(platform) => builder.platform(platform).build(),
        None => builder.build(),
    }
}

fn build_create_body(request: &ServerContainerRequest) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(request.image())),
        env: Some(request.env().to_vec()),
        host_config: Some(build_host_config(request)),
        ..ContainerCreateBody::default()
    }
}

fn build_host_config(request: &ServerContainerRequest) -> HostConfig {
    let port_bindings = request.port_binding().map(|(host_port, container_port)| {
        HashMap::from([(
            format!("{container_port}/tcp"),
            Some(vec![PortBinding {
                host_ip: Some(String::from(HOST_BIND_ADDRESS)),
                host_port: Some(host_port.to_string()),
            }]),
        )])
    });

    HostConfig {
        port_bindings,
        binds: request.bind().map(|bind| vec![String::from(bind)]),
        ..HostConfig::default()
    }
}
