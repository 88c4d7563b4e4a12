//! Error types for venv-manager

use thiserror::Error;

/// Errors that can occur while managing an isolated environment
#[derive(Error, Debug)]
pub enum VenvError {
    /// Something other than a directory occupies the environment path
    #[error("Environment path exists but is not a directory: {0}")]
    NotADirectory(String),

    /// Environment directory exists but holds no interpreter
    #[error("Isolated environment at {0} has no Python interpreter")]
    MissingInterpreter(String),

    /// The environment's bin directory cannot be placed on PATH
    #[error("Cannot prepend {0} to PATH: {1}")]
    InvalidSearchPath(String, String),

    /// Dependency manifest not found
    #[error("Dependency manifest not found at path: {0}")]
    ManifestNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
