//! Setup-and-run orchestration.
//!
//! Runs the fixed sequence: ensure environment, activate, check manifest,
//! upgrade pip, install, check generator, run generator. The first
//! failure ends the run.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::runner::{CommandRunner, StepResult};
use crate::step::{Step, StepCommand};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use venv_manager::{
    Activation, DependencyManifest, EnvironmentStatus, IsolatedEnvironment, VenvError,
};

/// Lines of captured stderr shown when a step fails.
const STDERR_TAIL_LINES: usize = 20;

/// Record of one setup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Resolved project root.
    pub root: PathBuf,

    /// Created or reused; unset if the check never completed.
    pub environment: Option<EnvironmentStatus>,

    /// Fingerprint of the installed manifest.
    pub manifest_fingerprint: Option<String>,

    /// Steps that ran, in order.
    pub steps: Vec<StepResult>,

    /// Whether the whole run succeeded.
    pub success: bool,

    /// Diagnostic of the failure that ended the run.
    pub failure: Option<String>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Empty report for a run rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            root: root.into(),
            environment: None,
            manifest_fingerprint: None,
            steps: Vec::new(),
            success: false,
            failure: None,
            duration_ms: 0,
        }
    }

    /// Whether `step` was launched during this run.
    pub fn ran(&self, step: Step) -> bool {
        self.steps.iter().any(|s| s.step == step)
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Drives a setup run through a [`CommandRunner`].
pub struct Orchestrator<R: CommandRunner> {
    config: SetupConfig,
    runner: R,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(config: SetupConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute the full workflow.
    ///
    /// Returns the report of a successful run, or the error that ended it.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new(&self.config.root);
        self.run_with_report(&mut report).await?;
        Ok(report)
    }

    /// Execute the full workflow, filling `report` whatever the outcome.
    pub async fn run_with_report(&self, report: &mut RunReport) -> Result<()> {
        let start = Instant::now();
        let outcome = self.execute(report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(()) => {
                report.success = true;
                info!(
                    run_id = %report.run_id,
                    duration_ms = report.duration_ms,
                    "Setup run completed"
                );
            }
            Err(e) => {
                report.success = false;
                report.failure = Some(e.to_string());
                error!(run_id = %report.run_id, error = %e, "Setup run failed");
            }
        }

        outcome
    }

    async fn execute(&self, report: &mut RunReport) -> Result<()> {
        let root = resolve_root(&self.config.root)?;
        report.root = root.clone();
        info!(run_id = %report.run_id, root = %root.display(), "Starting setup run");

        let env = IsolatedEnvironment::new(self.config.venv_under(&root));
        let status = self.ensure_environment(&env, &root, report).await?;
        report.environment = Some(status);

        // Released on every return path below.
        let activation = env.activate()?;
        self.run_in_environment(&activation, &root, report).await
    }

    /// Create the environment unless it is already present.
    async fn ensure_environment(
        &self,
        env: &IsolatedEnvironment,
        root: &Path,
        report: &mut RunReport,
    ) -> Result<EnvironmentStatus> {
        if env.exists()? {
            info!(path = %env.root().display(), "Reusing existing isolated environment");
            if let Err(e) = env.validate() {
                warn!(error = %e, "Existing environment looks incomplete");
            }
            return Ok(EnvironmentStatus::Reused);
        }

        info!(path = %env.root().display(), "Creating isolated environment");
        let command = self.prepare(
            StepCommand::create_environment(&self.config.host_python, env),
            root,
        );
        let result = self.execute_step(&command, report).await?;

        if !result.passed() {
            return Err(SetupError::EnvironmentCreationFailure {
                path: env.root().to_path_buf(),
                reason: format!(
                    "{} exited with code {}: {}",
                    self.config.host_python,
                    result.exit_code,
                    result.stderr_tail(STDERR_TAIL_LINES)
                ),
            });
        }

        env.validate()
            .map_err(|e| SetupError::EnvironmentCreationFailure {
                path: env.root().to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(EnvironmentStatus::Created)
    }

    async fn run_in_environment(
        &self,
        activation: &Activation<'_>,
        root: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        // No installer runs, pip included, without a manifest.
        let manifest_path = self.config.manifest_under(root);
        let manifest = DependencyManifest::load(&manifest_path).map_err(|e| match e {
            VenvError::ManifestNotFound(_) => SetupError::MissingManifest {
                path: manifest_path.clone(),
            },
            other => other.into(),
        })?;
        let fingerprint = manifest.fingerprint();
        if manifest.is_empty() {
            warn!(path = %manifest_path.display(), "Requirements file lists no packages");
        }

        let upgrade = self.prepare(StepCommand::upgrade_installer(activation), root);
        let result = self.execute_step(&upgrade, report).await?;
        check_installer(&result)?;

        info!(
            requirements = manifest.requirement_count(),
            fingerprint = %fingerprint.short(),
            "Installing dependencies"
        );
        report.manifest_fingerprint = Some(fingerprint.as_str().to_string());

        let install = self.prepare(
            StepCommand::install_dependencies(activation, &manifest_path),
            root,
        );
        let result = self.execute_step(&install, report).await?;
        check_installer(&result)?;

        let generator_path = self.config.generator_under(root);
        if !generator_path.is_file() {
            return Err(SetupError::MissingGenerator {
                path: generator_path,
            });
        }

        info!(script = %generator_path.display(), "Running config generator");
        let generate = self.prepare(
            StepCommand::run_generator(activation, &generator_path),
            root,
        );
        let result = self.execute_step(&generate, report).await?;
        if !result.passed() {
            return Err(SetupError::GeneratorFailure {
                exit_code: result.exit_code,
            });
        }

        Ok(())
    }

    fn prepare(&self, command: StepCommand, root: &Path) -> StepCommand {
        command
            .current_dir(root)
            .timeout(self.config.step_timeout_secs)
    }

    async fn execute_step(
        &self,
        command: &StepCommand,
        report: &mut RunReport,
    ) -> Result<StepResult> {
        debug!(step = %command.step, command = %command.command_line(), "Executing step");
        let result = self.runner.run(command).await?;
        info!(
            step = %result.step,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "Step finished"
        );
        report.steps.push(result.clone());
        Ok(result)
    }
}

fn check_installer(result: &StepResult) -> Result<()> {
    if result.passed() {
        return Ok(());
    }
    let stderr = result.stderr_tail(STDERR_TAIL_LINES);
    if !stderr.is_empty() {
        error!(step = %result.step, "Installer output:\n{}", stderr);
    }
    Err(SetupError::InstallationFailure {
        step: result.step,
        exit_code: result.exit_code,
        stderr,
    })
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(root).map_err(|e| {
        SetupError::Io(std::io::Error::new(
            e.kind(),
            format!("project root {} is not accessible: {}", root.display(), e),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingRunner;
    use tempfile::tempdir;

    #[test]
    fn test_run_report_ran() {
        let mut report = RunReport::new("/tmp");
        assert!(!report.ran(Step::RunGenerator));
        report.steps.push(StepResult {
            step: Step::RunGenerator,
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
            success: true,
        });
        assert!(report.ran(Step::RunGenerator));
    }

    #[test]
    fn test_run_report_write_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport::new(dir.path());
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["steps"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let dir = tempdir().unwrap();
        let config = SetupConfig::new(dir.path().join("does-not-exist"));
        let orchestrator = Orchestrator::new(config, RecordingRunner::new());

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, SetupError::Io(_)));
        assert!(orchestrator.runner().steps().is_empty());
    }

    #[tokio::test]
    async fn test_steps_run_in_project_root_with_timeout() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("utils")).unwrap();
        std::fs::write(dir.path().join("utils/requirements.txt"), "requests\n").unwrap();
        std::fs::write(dir.path().join("utils/generate_app_configs.py"), "").unwrap();

        let config = SetupConfig::new(dir.path()).with_step_timeout(90);
        let orchestrator = Orchestrator::new(config, RecordingRunner::new());
        orchestrator.run().await.unwrap();

        let root = std::fs::canonicalize(dir.path()).unwrap();
        for call in orchestrator.runner().calls() {
            assert_eq!(call.current_dir.as_deref(), Some(root.as_path()));
            assert_eq!(call.timeout_secs, 90);
        }
    }
}
