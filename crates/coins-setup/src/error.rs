//! Error types for the setup orchestrator

use crate::step::Step;
use std::path::PathBuf;
use thiserror::Error;
use venv_manager::VenvError;

/// Every way a setup run can fail. All of them are fatal.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Dependency manifest absent at its expected path
    #[error("Requirements file not found at {}", path.display())]
    MissingManifest { path: PathBuf },

    /// Generator script absent at its expected path
    #[error("Generator script not found at {}", path.display())]
    MissingGenerator { path: PathBuf },

    /// `python -m venv` exited non-zero or left no interpreter behind
    #[error("Failed to create isolated environment at {}: {reason}", path.display())]
    EnvironmentCreationFailure { path: PathBuf, reason: String },

    /// The package installer exited non-zero
    #[error("Installer step {step} failed with exit code {exit_code}")]
    InstallationFailure {
        step: Step,
        exit_code: i32,
        stderr: String,
    },

    /// The generator exited non-zero
    #[error("Generator exited with code {exit_code}")]
    GeneratorFailure { exit_code: i32 },

    /// A step exceeded its configured timeout
    #[error("Step {step} timed out after {timeout_secs} seconds")]
    StepTimedOut { step: Step, timeout_secs: u64 },

    /// The program for a step could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Environment layer error
    #[error(transparent)]
    Environment(#[from] VenvError),

    /// Run report serialization error
    #[error("Failed to serialize run report: {0}")]
    Report(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = SetupError::MissingManifest {
            path: PathBuf::from("utils/requirements.txt"),
        };
        assert!(err.to_string().contains("utils/requirements.txt"));

        let err = SetupError::MissingGenerator {
            path: PathBuf::from("utils/generate_app_configs.py"),
        };
        assert!(err.to_string().contains("utils/generate_app_configs.py"));
    }

    #[test]
    fn test_every_failure_exits_with_one() {
        let errors = [
            SetupError::MissingManifest {
                path: PathBuf::from("r.txt"),
            },
            SetupError::InstallationFailure {
                step: Step::InstallDependencies,
                exit_code: 2,
                stderr: String::new(),
            },
            SetupError::GeneratorFailure { exit_code: 42 },
        ];
        for err in &errors {
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn test_generator_failure_reports_code() {
        let err = SetupError::GeneratorFailure { exit_code: 42 };
        assert_eq!(err.to_string(), "Generator exited with code 42");
    }
}
