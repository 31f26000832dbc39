//! Render error types.

use prism_gpu::GpuError;
use thiserror::Error;

/// Renderer-level errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Error from the GPU layer.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// Configuration loading or parsing failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Renderer used outside its protocol.
    #[error("Invalid renderer state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
