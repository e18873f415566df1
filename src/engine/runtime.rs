//! Container engine operations behind a mockable trait seam.
//!
//! Every engine call the setup workflow makes goes through
//! [`ContainerRuntime`], implemented here for `bollard::Docker`. Tests swap in
//! a `mockall` double, so no stage needs a live daemon to be exercised.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptionsBuilder, RemoveContainerOptionsBuilder,
    StartContainerOptions, StopContainerOptions,
};
use futures_util::TryStreamExt;

/// HTTP status the engine answers with for unknown images and containers.
const NOT_FOUND: u16 = 404;

/// Boxed future type returned by [`ContainerRuntime`] implementors.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BollardError>> + Send + 'a>>;

/// Engine operations used to provision the database server.
pub trait ContainerRuntime {
    /// Check that the engine answers API requests.
    fn ping(&self) -> EngineFuture<'_, ()>;

    /// Report whether `image` is present in the local image store.
    fn image_present(&self, image: &str) -> EngineFuture<'_, bool>;

    /// Pull `image`, optionally for a specific platform, to completion.
    fn pull_image(&self, image: &str, platform: Option<String>) -> EngineFuture<'_, ()>;

    /// Stop the named container.
    fn stop_container(&self, name: &str) -> EngineFuture<'_, ()>;

    /// Force-remove the named container.
    fn remove_container(&self, name: &str) -> EngineFuture<'_, ()>;

    /// Create a container and return its ID.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, String>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()>;
}

impl ContainerRuntime for Docker {
    fn ping(&self) -> EngineFuture<'_, ()> {
        Box::pin(async move { Self::ping(self).await.map(|_| ()) })
    }

    fn image_present(&self, image: &str) -> EngineFuture<'_, bool> {
        let image_owned = String::from(image);
        Box::pin(async move {
            match Self::inspect_image(self, &image_owned).await {
                Ok(_) => Ok(true),
                Err(error) if is_not_found(&error) => Ok(false),
                Err(error) => Err(error),
            }
        })
    }

    fn pull_image(&self, image: &str, platform: Option<String>) -> EngineFuture<'_, ()> {
        let mut builder = CreateImageOptionsBuilder::new().from_image(image);
        if let Some(ref value) = platform {
            builder = builder.platform(value);
        }
        let options = builder.build();
        Box::pin(async move {
            Self::create_image(self, Some(options), None, None)
                .try_collect::<Vec<_>>()
                .await
                .map(|_| ())
        })
    }

    fn stop_container(&self, name: &str) -> EngineFuture<'_, ()> {
        let name_owned = String::from(name);
        Box::pin(async move {
            Self::stop_container(self, &name_owned, None::<StopContainerOptions>).await
        })
    }

    fn remove_container(&self, name: &str) -> EngineFuture<'_, ()> {
        let name_owned = String::from(name);
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        Box::pin(async move { Self::remove_container(self, &name_owned, Some(options)).await })
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, String> {
        Box::pin(async move {
            Self::create_container(self, options, body)
                .await
                .map(|response| response.id)
        })
    }

    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &id_owned, None::<StartContainerOptions>).await
        })
    }
}

/// Whether an engine error means the object does not exist.
#[must_use]
pub fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == NOT_FOUND
    )
}
