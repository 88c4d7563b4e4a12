//! Step execution.

use crate::error::SetupError;
use crate::step::{OutputMode, Step, StepCommand};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Result of a step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step that ran.
    pub step: Step,

    /// Exit code (0 = success, -1 = terminated by signal).
    pub exit_code: i32,

    /// Captured stdout (empty for inherited output).
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub stdout: String,

    /// Captured stderr (empty for inherited output).
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StepResult {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Last `max_lines` lines of stderr, for diagnostics.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Executes step commands.
///
/// The orchestrator only ever talks to this trait, so tests can observe
/// which steps would have been launched without a Python toolchain.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// A non-zero exit is reported through [`StepResult`], not as an error.
    /// Errors mean the process could not be started or timed out.
    async fn run(&self, command: &StepCommand) -> Result<StepResult>;
}

/// Runs steps as real child processes on the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &StepCommand) -> Result<StepResult> {
        let start = Instant::now();
        debug!(step = %command.step, command = %command.command_line(), "Spawning");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).kill_on_drop(true);

        for (key, value) in &command.envs {
            cmd.env(key, value);
        }
        for key in &command.env_remove {
            cmd.env_remove(key);
        }
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        match command.output {
            OutputMode::Captured => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            OutputMode::Inherited => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }

        let child = cmd.spawn().map_err(|source| SetupError::Spawn {
            program: command.program.display().to_string(),
            source,
        })?;

        let output = if command.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(command.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| SetupError::StepTimedOut {
                step: command.step,
                timeout_secs: command.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(StepResult {
            step: command.step,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stderr: &str) -> StepResult {
        StepResult {
            step: Step::InstallDependencies,
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_ms: 100,
            success: exit_code == 0,
        }
    }

    #[test]
    fn test_step_result_passed() {
        assert!(result(0, "").passed());
    }

    #[test]
    fn test_step_result_failed() {
        assert!(!result(1, "error").passed());
    }

    #[test]
    fn test_stderr_tail() {
        let r = result(1, "one\ntwo\nthree\n");
        assert_eq!(r.stderr_tail(2), "two\nthree");
        assert_eq!(r.stderr_tail(10), "one\ntwo\nthree");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_simple_command() {
        let command = StepCommand::new(Step::RunGenerator, "echo")
            .arg("hello")
            .timeout(60);
        let command = StepCommand {
            output: OutputMode::Captured,
            ..command
        };

        let result = TokioCommandRunner.run(&command).await.expect("execute failed");
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_command() {
        let command = StepCommand::new(Step::UpgradeInstaller, "sh").args(["-c", "exit 3"]);

        let result = TokioCommandRunner.run(&command).await.expect("execute failed");
        assert!(!result.passed());
        assert_eq!(result.exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_overlay_reaches_child() {
        let command = StepCommand::new(Step::UpgradeInstaller, "sh")
            .args(["-c", "printf '%s' \"$VIRTUAL_ENV\""]);
        let mut command = command;
        command
            .envs
            .push(("VIRTUAL_ENV".to_string(), "/tmp/some-venv".into()));

        let result = TokioCommandRunner.run(&command).await.unwrap();
        assert_eq!(result.stdout, "/tmp/some-venv");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_fatal() {
        let command = StepCommand::new(Step::UpgradeInstaller, "sleep")
            .arg("5")
            .timeout(1);

        let err = TokioCommandRunner.run(&command).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::StepTimedOut {
                step: Step::UpgradeInstaller,
                timeout_secs: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let command = StepCommand::new(Step::CreateEnvironment, "no-such-python-xyz");
        let err = TokioCommandRunner.run(&command).await.unwrap_err();
        assert!(matches!(err, SetupError::Spawn { .. }));
    }
}
