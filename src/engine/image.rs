//! Prerequisite installation for engine images.
//!
//! The server image is the one prerequisite the binary cannot link in. It is
//! located with an inspect, installed with a pull when missing, and
//! re-checked afterwards.

use tracing::{debug, info};

use super::{ContainerRuntime, EngineConnector};
use crate::error::{ContainerError, TallyError};

/// What [`EngineConnector::ensure_image_async`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// The image was already present.
    AlreadyPresent,
    /// The image was pulled during this run.
    Pulled,
}

impl EngineConnector {
    /// Make sure `image` is available locally, pulling it if absent.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImagePullFailed` when inspecting or pulling
    /// fails, and `ContainerError::ImageMissing` when the image is still
    /// absent after a pull reported success.
    pub async fn ensure_image_async<R: ContainerRuntime + ?Sized>(
        runtime: &R,
        image: &str,
        platform: Option<&str>,
    ) -> Result<ImageStatus, TallyError> {
        let pull_failed = |message: String| {
            TallyError::from(ContainerError::ImagePullFailed {
                image: String::from(image),
                message,
            })
        };

        if runtime
            .image_present(image)
            .await
            .map_err(|e| pull_failed(e.to_string()))?
        {
            debug!(image, "image already present");
            return Ok(ImageStatus::AlreadyPresent);
        }

        info!(image, "pulling image");
        runtime
            .pull_image(image, platform.map(String::from))
            .await
            .map_err(|e| pull_failed(e.to_string()))?;

        let present = runtime
            .image_present(image)
            .await
            .map_err(|e| pull_failed(e.to_string()))?;
        if !present {
            return Err(ContainerError::ImageMissing {
                image: String::from(image),
            }
            .into());
        }

        Ok(ImageStatus::Pulled)
    }
}
