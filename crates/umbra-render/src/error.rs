//! Rendering error types.

use thiserror::Error;
use umbra_core::CoreError;

use crate::depth_dump::DepthDumpError;

/// Broad classification of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration or geometry input.
    Validation,
    /// GPU allocation failure or use before initialization.
    Resource,
    /// Begin/end protocol violation.
    State,
    /// Debug output could not be written.
    Io,
}

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Graphics resources have not been created yet.
    #[error("graphics resources not initialized - call initialize_graphics_resources() first")]
    NotInitialized,

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Framebuffer is not complete.
    #[error("framebuffer '{0}' is incomplete")]
    FramebufferIncomplete(String),

    /// Buffer creation failed.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    /// Out of memory.
    #[error("out of GPU memory while creating {0}")]
    OutOfMemory(String),

    /// Reading pixels back from the GPU failed.
    #[error("pixel readback failed: {0}")]
    ReadbackFailed(String),

    /// Failed to create a wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create a wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// `begin` was called inside an active light-space pass.
    #[error("light-space pass already active - call end() first")]
    PassAlreadyActive,

    /// `end` was called without a matching `begin`.
    #[error("no light-space pass active - call begin() first")]
    PassNotActive,

    /// Writing a depth dump failed.
    #[error("depth dump failed: {0}")]
    Dump(#[from] DepthDumpError),

    /// Invalid configuration or geometry.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RenderError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Core(_) => ErrorKind::Validation,
            RenderError::PassAlreadyActive | RenderError::PassNotActive => ErrorKind::State,
            RenderError::Dump(_) => ErrorKind::Io,
            RenderError::NotInitialized
            | RenderError::TextureCreationFailed(_)
            | RenderError::FramebufferIncomplete(_)
            | RenderError::BufferCreationFailed(_)
            | RenderError::OutOfMemory(_)
            | RenderError::ReadbackFailed(_)
            | RenderError::AdapterCreationFailed
            | RenderError::DeviceCreationFailed(_) => ErrorKind::Resource,
        }
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
