//! venv-manager: isolated Python environments for coins-setup
//!
//! This crate provides the environment layer of the setup workflow.
//! It knows where a virtual environment lives, whether it is present,
//! how to activate it for child processes, and how to read the
//! dependency manifest that gets installed into it.
//!
//! It never spawns processes itself; creation and installation commands
//! are described here and executed by the orchestrator.

pub mod environment;
pub mod error;
pub mod manifest;

pub use environment::{Activation, EnvironmentStatus, IsolatedEnvironment};
pub use error::VenvError;
pub use manifest::{DependencyManifest, ManifestEntry, ManifestFingerprint};

/// Result type for venv-manager operations
pub type Result<T> = std::result::Result<T, VenvError>;

/// Default host interpreter used to create environments
#[cfg(windows)]
pub const DEFAULT_HOST_PYTHON: &str = "python";
#[cfg(not(windows))]
pub const DEFAULT_HOST_PYTHON: &str = "python3";

/// Check if a host interpreter can be started
pub fn is_python_available(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interpreter_is_unavailable() {
        assert!(!is_python_available("definitely-not-a-python-binary-xyz"));
    }
}
