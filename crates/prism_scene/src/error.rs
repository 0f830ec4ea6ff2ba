//! Scene error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    /// The scene variant in use hosts exactly one composition root and
    /// cannot attach overlay layers
    #[error("this scene variant does not support layers")]
    LayersUnsupported,

    /// Platform capability probe failed while building a scene
    #[error("platform error: {0}")]
    Platform(#[from] prism_platform::PlatformError),
}

pub type Result<T> = std::result::Result<T, SceneError>;
