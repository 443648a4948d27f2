//! Error type for the umbra facade.

use thiserror::Error;
use umbra_core::CoreError;
use umbra_render::{ErrorKind, RenderError};

/// Errors surfaced by the facade.
#[derive(Error, Debug)]
pub enum UmbraError {
    /// Invalid configuration or geometry.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Graphics resource, pass protocol or dump failure.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl UmbraError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            UmbraError::Core(_) => ErrorKind::Validation,
            UmbraError::Render(err) => err.kind(),
        }
    }
}

/// A specialized Result type for umbra operations.
pub type Result<T> = std::result::Result<T, UmbraError>;
