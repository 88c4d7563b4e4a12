//! Setup configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Isolated environment directory, relative to the project root.
pub const DEFAULT_VENV_DIR: &str = "venv";

/// Dependency manifest, relative to the project root.
pub const DEFAULT_MANIFEST_PATH: &str = "./utils/requirements.txt";

/// Generator script, relative to the project root.
pub const DEFAULT_GENERATOR_PATH: &str = "./utils/generate_app_configs.py";

/// Where things live and how steps are launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Project root every relative path is resolved against.
    pub root: PathBuf,

    /// Isolated environment directory.
    pub venv_dir: PathBuf,

    /// Dependency manifest.
    pub manifest_path: PathBuf,

    /// Generator script.
    pub generator_path: PathBuf,

    /// Host interpreter used to create the environment.
    pub host_python: String,

    /// Per-step timeout in seconds (0 = none).
    pub step_timeout_secs: u64,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            root: PathBuf::from("."),
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            generator_path: PathBuf::from(DEFAULT_GENERATOR_PATH),
            host_python: venv_manager::DEFAULT_HOST_PYTHON.to_string(),
            step_timeout_secs: 0,
        }
    }
}

impl SetupConfig {
    /// Default layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::default().with_root(root)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_host_python(mut self, program: &str) -> Self {
        self.host_python = program.to_string();
        self
    }

    pub fn with_step_timeout(mut self, secs: u64) -> Self {
        self.step_timeout_secs = secs;
        self
    }

    /// Environment directory under `root`.
    pub fn venv_under(&self, root: &Path) -> PathBuf {
        root.join(&self.venv_dir)
    }

    /// Manifest path under `root`.
    pub fn manifest_under(&self, root: &Path) -> PathBuf {
        root.join(&self.manifest_path)
    }

    /// Generator path under `root`.
    pub fn generator_under(&self, root: &Path) -> PathBuf {
        root.join(&self.generator_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = SetupConfig::default();
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.venv_dir, PathBuf::from("venv"));
        assert_eq!(config.manifest_path, PathBuf::from("./utils/requirements.txt"));
        assert_eq!(
            config.generator_path,
            PathBuf::from("./utils/generate_app_configs.py")
        );
        assert_eq!(config.step_timeout_secs, 0);
    }

    #[test]
    fn test_builders() {
        let config = SetupConfig::new("/srv/coins")
            .with_host_python("python3.11")
            .with_step_timeout(120);
        assert_eq!(config.root, PathBuf::from("/srv/coins"));
        assert_eq!(config.host_python, "python3.11");
        assert_eq!(config.step_timeout_secs, 120);
    }

    #[test]
    fn test_paths_resolve_under_root() {
        let config = SetupConfig::default();
        let root = Path::new("/srv/coins");
        assert_eq!(config.venv_under(root), PathBuf::from("/srv/coins/venv"));
        assert!(config
            .manifest_under(root)
            .ends_with("utils/requirements.txt"));
        assert!(config
            .generator_under(root)
            .starts_with("/srv/coins"));
    }
}
