//! In-process fake runner (testing only)
//!
//! `RecordingRunner` satisfies [`CommandRunner`] without spawning anything.
//! It records every command it receives and answers with scripted exit
//! codes, so tests can assert which steps were launched and with what.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use venv_manager::IsolatedEnvironment;

use crate::runner::{CommandRunner, StepResult};
use crate::step::{Step, StepCommand};
use crate::Result;

/// A command as the runner saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub step: Step,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, OsString)>,
    pub env_remove: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

/// Records commands and returns scripted exit codes (default 0).
///
/// A successful `CreateEnvironment` lays down a minimal environment
/// (directory plus empty interpreter file) the way `python -m venv` would.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    exit_codes: HashMap<Step, i32>,
    stderr: HashMap<Step, String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` exit with `code`.
    pub fn with_exit_code(mut self, step: Step, code: i32) -> Self {
        self.exit_codes.insert(step, code);
        self
    }

    /// Make `step` report `text` on stderr.
    pub fn with_stderr(mut self, step: Step, text: &str) -> Self {
        self.stderr.insert(step, text.to_string());
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Steps launched, in order.
    pub fn steps(&self) -> Vec<Step> {
        self.calls.lock().unwrap().iter().map(|c| c.step).collect()
    }

    /// Whether `step` was launched at least once.
    pub fn invoked(&self, step: Step) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.step == step)
    }

    /// Recorded call for `step`, if any.
    pub fn call(&self, step: Step) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.step == step)
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &StepCommand) -> Result<StepResult> {
        self.calls.lock().unwrap().push(RecordedCall {
            step: command.step,
            program: command.program.clone(),
            args: command.args.clone(),
            envs: command.envs.clone(),
            env_remove: command.env_remove.clone(),
            current_dir: command.current_dir.clone(),
            timeout_secs: command.timeout_secs,
        });

        let exit_code = self.exit_codes.get(&command.step).copied().unwrap_or(0);

        if command.step == Step::CreateEnvironment && exit_code == 0 {
            if let Some(target) = command.args.last() {
                let env = IsolatedEnvironment::new(PathBuf::from(target));
                std::fs::create_dir_all(env.bin_dir())?;
                std::fs::write(env.interpreter(), b"")?;
            }
        }

        Ok(StepResult {
            step: command.step,
            exit_code,
            stdout: String::new(),
            stderr: self.stderr.get(&command.step).cloned().unwrap_or_default(),
            duration_ms: 0,
            success: exit_code == 0,
        })
    }
}
