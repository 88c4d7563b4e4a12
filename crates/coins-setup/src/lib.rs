//! coins-setup - environment bootstrap for the coin-config generator
//!
//! Provides a setup orchestrator that:
//! - Creates the project's Python virtual environment if it is missing
//! - Upgrades pip and installs the requirements file into it
//! - Runs the config generator inside it and propagates its exit status
//!
//! Every failure is fatal and maps to exit code 1.

pub mod config;
pub mod error;
pub mod fakes;
pub mod orchestrator;
pub mod runner;
pub mod step;
pub mod telemetry;

// Re-export key types
pub use config::SetupConfig;
pub use error::SetupError;
pub use orchestrator::{Orchestrator, RunReport};
pub use runner::{CommandRunner, StepResult, TokioCommandRunner};
pub use step::{OutputMode, Step, StepCommand};
pub use telemetry::init_tracing;
pub use venv_manager::EnvironmentStatus;

/// Result type for setup operations
pub type Result<T> = std::result::Result<T, SetupError>;
