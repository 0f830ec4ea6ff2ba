//! Platform error types

use thiserror::Error;

/// Errors reported against a host platform
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Capability not available on this platform (e.g. the host cannot
    /// report a usable window)
    #[error("platform capability unavailable: {0}")]
    Unavailable(String),
}
