//! Engine health check.
//!
//! The engine ping is the runtime prerequisite check: a missing socket,
//! a permission problem or a stopped daemon all surface here.

use std::time::Duration;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS, error_classification};
use crate::engine::ContainerRuntime;
use crate::error::{ContainerError, TallyError};

impl EngineConnector {
    /// Verify the container engine is responsive.
    ///
    /// Sends a ping through `runtime` and waits for the answer. Transport
    /// failures are classified against `socket` so a missing or unreadable
    /// socket is reported by path.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound` or
    /// `ContainerError::PermissionDenied` when the socket is unusable,
    /// `ContainerError::HealthCheckFailed` if the engine answers with an
    /// error, and `ContainerError::HealthCheckTimeout` if it does not answer
    /// in time.
    pub async fn health_check_async<R: ContainerRuntime + ?Sized>(
        runtime: &R,
        socket: &str,
    ) -> Result<(), TallyError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        let outcome = tokio::time::timeout(timeout, runtime.ping())
            .await
            .map_err(|_| {
                TallyError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?;

        outcome.map_err(|error| {
            let classified = match error {
                bollard::errors::Error::DockerResponseServerError { .. } => {
                    ContainerError::HealthCheckFailed {
                        message: error.to_string(),
                    }
                }
                _ => error_classification::classify_connection_error(&error, socket),
            };
            TallyError::from(classified)
        })
    }
}
