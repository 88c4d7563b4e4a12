//! Isolated environment layout and scoped activation
//!
//! An [`IsolatedEnvironment`] is a directory created by `python -m venv`.
//! Activating it yields an [`Activation`] guard describing how child
//! processes must be launched so that the environment's interpreter and
//! scripts resolve first. The host process's own variables are never
//! touched, so dropping the guard is all deactivation needs.

use crate::error::VenvError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the scripts directory inside a venv
#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

#[cfg(windows)]
const INTERPRETER: &str = "python.exe";
#[cfg(not(windows))]
const INTERPRETER: &str = "python";

/// Variables that would make the child pick up a foreign Python installation
const CLEARED_VARS: &[&str] = &["PYTHONHOME"];

/// Outcome of the presence check for an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    /// The directory did not exist and was created during this run
    Created,
    /// The directory already existed and was reused as-is
    Reused,
}

/// A filesystem-resident Python virtual environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedEnvironment {
    root: PathBuf,
}

impl IsolatedEnvironment {
    /// Describe the environment rooted at `root`. Nothing is created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        IsolatedEnvironment { root: root.into() }
    }

    /// Environment root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the environment directory is present.
    ///
    /// Errors if the path is occupied by a regular file, since neither
    /// reusing nor creating an environment there can succeed.
    pub fn exists(&self) -> Result<bool> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(true),
            Ok(_) => Err(VenvError::NotADirectory(
                self.root.display().to_string(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Directory holding the environment's executables
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    /// The environment's own interpreter
    pub fn interpreter(&self) -> PathBuf {
        self.bin_dir().join(INTERPRETER)
    }

    /// Arguments for `<host-python>` that create this environment
    pub fn creation_args(&self) -> Vec<OsString> {
        vec![
            OsString::from("-m"),
            OsString::from("venv"),
            self.root.clone().into_os_string(),
        ]
    }

    /// Check that a usable interpreter is present
    pub fn validate(&self) -> Result<()> {
        if !self.exists()? {
            return Err(VenvError::MissingInterpreter(
                self.root.display().to_string(),
            ));
        }
        let interpreter = self.interpreter();
        if !interpreter.is_file() {
            warn!(path = %interpreter.display(), "Interpreter missing from environment");
            return Err(VenvError::MissingInterpreter(
                self.root.display().to_string(),
            ));
        }
        Ok(())
    }

    /// Activate against the current process `PATH`
    pub fn activate(&self) -> Result<Activation<'_>> {
        self.activate_with_path(std::env::var_os("PATH"))
    }

    /// Activate against an explicit base search path
    pub fn activate_with_path(&self, base_path: Option<OsString>) -> Result<Activation<'_>> {
        let bin_dir = absolute(&self.bin_dir())?;
        let root = absolute(&self.root)?;

        let mut dirs = vec![bin_dir.clone()];
        if let Some(base) = &base_path {
            dirs.extend(std::env::split_paths(base));
        }
        let search_path = std::env::join_paths(dirs).map_err(|e| {
            VenvError::InvalidSearchPath(bin_dir.display().to_string(), e.to_string())
        })?;

        debug!(env = %root.display(), "Activated isolated environment");

        Ok(Activation {
            env: self,
            interpreter: bin_dir.join(INTERPRETER),
            vars: vec![
                ("PATH".to_string(), search_path),
                ("VIRTUAL_ENV".to_string(), root.into_os_string()),
            ],
        })
    }
}

/// Scoped activation of an [`IsolatedEnvironment`].
///
/// Every subprocess that should run inside the environment borrows the
/// guard and applies [`Activation::vars`] and [`Activation::cleared_vars`]
/// to its command. The scope ends when the guard is dropped.
#[derive(Debug)]
pub struct Activation<'a> {
    env: &'a IsolatedEnvironment,
    interpreter: PathBuf,
    vars: Vec<(String, OsString)>,
}

impl Activation<'_> {
    /// Absolute path of the interpreter commands inside the scope must use
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Variables to set on child processes
    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    /// Variables to remove from child processes
    pub fn cleared_vars(&self) -> &'static [&'static str] {
        CLEARED_VARS
    }

    /// Look up one of the overlay variables
    pub fn var(&self, key: &str) -> Option<&OsString> {
        self.vars.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        debug!(env = %self.env.root.display(), "Deactivated isolated environment");
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
