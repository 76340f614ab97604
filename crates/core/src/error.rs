//! Application-level error type.
//!
//! Lower crates have their own error enums. At the seams where the window,
//! the renderer and the configuration meet, their errors are folded into
//! [`Error`] with the message preserved.

use std::fmt::Display;

use thiserror::Error;

/// Error type for the glue between window, renderer and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Resource loading errors
    #[error("Resource error: {0}")]
    Resource(String),

    /// Shader loading errors
    #[error("Shader error: {0}")]
    Shader(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid command line or environment configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps a graphics-layer error.
    pub fn vulkan(err: impl Display) -> Self {
        Error::Vulkan(err.to_string())
    }

    /// Wraps a windowing error.
    pub fn window(err: impl Display) -> Self {
        Error::Window(err.to_string())
    }

    /// Wraps an asset error.
    pub fn resource(err: impl Display) -> Self {
        Error::Resource(err.to_string())
    }
}

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_messages() {
        assert_eq!(
            Error::vulkan("device lost").to_string(),
            "Vulkan error: device lost"
        );
        assert_eq!(
            Error::window("no display").to_string(),
            "Window error: no display"
        );
        assert_eq!(
            Error::Config("unknown flag".to_string()).to_string(),
            "Config error: unknown flag"
        );
    }

    #[test]
    fn test_io_conversion() {
        fn read() -> Result<Vec<u8>> {
            Ok(std::fs::read("/definitely/not/here")?)
        }
        assert!(matches!(read(), Err(Error::Io(_))));
    }
}
