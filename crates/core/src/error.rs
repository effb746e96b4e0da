//! Error types for the presenter.

use thiserror::Error;

/// Main error type for the non-GPU parts of the presenter.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors raised outside the RHI (e.g. surface creation)
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (parse failures, out-of-range values)
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the presenter's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::Config("frames_in_flight must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Config error: frames_in_flight must be at least 1"
        );
    }
}
