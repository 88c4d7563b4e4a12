//! Setup step definitions and the commands they run.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use venv_manager::{Activation, IsolatedEnvironment};

/// The subprocess-backed steps of a setup run, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// <host-python> -m venv venv
    CreateEnvironment,

    /// <venv-python> -m pip install --upgrade pip --quiet
    UpgradeInstaller,

    /// <venv-python> -m pip install -r utils/requirements.txt
    InstallDependencies,

    /// <venv-python> utils/generate_app_configs.py
    RunGenerator,
}

impl Step {
    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Step::CreateEnvironment => "create_environment",
            Step::UpgradeInstaller => "upgrade_installer",
            Step::InstallDependencies => "install_dependencies",
            Step::RunGenerator => "run_generator",
        }
    }

    /// How the step's output reaches the operator.
    ///
    /// Housekeeping steps are captured and only shown on failure; the
    /// dependency install and the generator stream straight through.
    pub fn output_mode(&self) -> OutputMode {
        match self {
            Step::CreateEnvironment | Step::UpgradeInstaller => OutputMode::Captured,
            Step::InstallDependencies | Step::RunGenerator => OutputMode::Inherited,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Piped and kept in the step result.
    Captured,
    /// Shared with the orchestrator's own streams.
    Inherited,
}

/// A fully described subprocess invocation for one step.
#[derive(Debug, Clone)]
pub struct StepCommand {
    /// Step this command implements.
    pub step: Step,

    /// Executable to launch.
    pub program: PathBuf,

    /// Arguments, in order.
    pub args: Vec<OsString>,

    /// Variables set on the child.
    pub envs: Vec<(String, OsString)>,

    /// Variables removed from the child.
    pub env_remove: Vec<String>,

    /// Working directory of the child.
    pub current_dir: Option<PathBuf>,

    /// Output handling.
    pub output: OutputMode,

    /// Timeout in seconds, 0 disables.
    pub timeout_secs: u64,
}

impl StepCommand {
    /// Bare command for `step` running `program`.
    pub fn new(step: Step, program: impl Into<PathBuf>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            env_remove: Vec::new(),
            current_dir: None,
            output: step.output_mode(),
            timeout_secs: 0,
        }
    }

    /// Create `env` using the host interpreter.
    pub fn create_environment(host_python: &str, env: &IsolatedEnvironment) -> Self {
        Self::new(Step::CreateEnvironment, host_python).args(env.creation_args())
    }

    /// Upgrade pip inside the activated environment.
    pub fn upgrade_installer(activation: &Activation<'_>) -> Self {
        Self::new(Step::UpgradeInstaller, activation.interpreter())
            .args(["-m", "pip", "install", "--upgrade", "pip", "--quiet"])
            .within(activation)
    }

    /// Install everything listed in `manifest` into the activated environment.
    pub fn install_dependencies(activation: &Activation<'_>, manifest: &Path) -> Self {
        Self::new(Step::InstallDependencies, activation.interpreter())
            .args(["-m", "pip", "install", "-r"])
            .arg(manifest)
            .within(activation)
    }

    /// Run the generator script with the environment's interpreter.
    pub fn run_generator(activation: &Activation<'_>, script: &Path) -> Self {
        Self::new(Step::RunGenerator, activation.interpreter())
            .arg(script)
            .within(activation)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Apply an environment activation to the child.
    pub fn within(mut self, activation: &Activation<'_>) -> Self {
        self.envs.extend(activation.vars().iter().cloned());
        self.env_remove
            .extend(activation.cleared_vars().iter().map(|v| v.to_string()));
        self
    }

    /// Set the child's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the timeout in seconds (0 = none).
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Printable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(|a| a.as_os_str()))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of an overlay variable, if set.
    pub fn env_var(&self, key: &str) -> Option<&OsString> {
        self.envs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
