//! Dependency manifest (pip requirements file)
//!
//! Reads the ordered list of package specifiers from a requirements file
//! and computes a content fingerprint so runs can be correlated with the
//! exact manifest they installed.

use crate::error::VenvError;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One meaningful line of a requirements file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestEntry {
    /// A package specifier, e.g. `requests==2.31.0`
    Requirement(String),
    /// An installer option line, e.g. `--index-url ...` or `-r base.txt`
    Option(String),
}

/// SHA-256 fingerprint of a normalized manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestFingerprint(String);

impl ManifestFingerprint {
    /// Full lowercase hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, or the whole value if shorter
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ManifestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed dependency manifest, entries kept in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    path: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl DependencyManifest {
    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    /// [`VenvError::ManifestNotFound`] if no regular file exists there.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(VenvError::ManifestNotFound(path.display().to_string()));
        }
        let content = std::fs::read(path)?;
        let manifest = Self::parse(path, &String::from_utf8_lossy(&content));
        debug!(
            path = %path.display(),
            requirements = manifest.requirement_count(),
            "Loaded dependency manifest"
        );
        Ok(manifest)
    }

    /// Parse manifest text. `path` is only recorded, never read.
    pub fn parse(path: &Path, content: &str) -> Self {
        let entries = logical_lines(content)
            .into_iter()
            .filter_map(|line| {
                let line = strip_comment(&line).trim().to_string();
                if line.is_empty() {
                    None
                } else if line.starts_with('-') {
                    Some(ManifestEntry::Option(line))
                } else {
                    Some(ManifestEntry::Requirement(line))
                }
            })
            .collect();

        DependencyManifest {
            path: path.to_path_buf(),
            entries,
        }
    }

    /// Location the manifest was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in file order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Package specifiers in file order
    pub fn requirements(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            ManifestEntry::Requirement(r) => Some(r.as_str()),
            ManifestEntry::Option(_) => None,
        })
    }

    /// Number of package specifiers
    pub fn requirement_count(&self) -> usize {
        self.requirements().count()
    }

    /// True when the manifest names no packages at all
    pub fn is_empty(&self) -> bool {
        self.requirement_count() == 0
    }

    /// Fingerprint of the meaningful entries.
    ///
    /// Comments, blank lines, and whitespace do not affect the result;
    /// reordering entries does.
    pub fn fingerprint(&self) -> ManifestFingerprint {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            let (tag, text) = match entry {
                ManifestEntry::Requirement(r) => (b"req:".as_slice(), r),
                ManifestEntry::Option(o) => (b"opt:".as_slice(), o),
            };
            hasher.update(tag);
            hasher.update(text.as_bytes());
            hasher.update(b"\0");
        }
        ManifestFingerprint(hex::encode(hasher.finalize()))
    }
}

/// Join backslash-continued lines, normalizing CRLF
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in content.lines() {
        let line = raw.trim_end();
        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(line);
        lines.push(std::mem::take(&mut pending));
    }
    if !pending.is_empty() {
        lines.push(pending);
    }

    lines
}

/// Drop a `#` comment that starts the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return &line[..i];
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
# pinned for the generator
requests==2.31.0
--index-url https://pypi.org/simple

python-dotenv>=1.0  # env loading
PyYAML
";

    #[test]
    fn test_parse_keeps_order_and_skips_comments() {
        let manifest = DependencyManifest::parse(Path::new("requirements.txt"), SAMPLE);
        let reqs: Vec<&str> = manifest.requirements().collect();
        assert_eq!(reqs, vec!["requests==2.31.0", "python-dotenv>=1.0", "PyYAML"]);
        assert_eq!(manifest.entries().len(), 4);
    }

    #[test]
    fn test_option_lines_are_not_requirements() {
        let manifest = DependencyManifest::parse(Path::new("r.txt"), "-r base.txt\n--pre\n");
        assert!(manifest.is_empty());
        assert_eq!(
            manifest.entries()[0],
            ManifestEntry::Option("-r base.txt".to_string())
        );
    }

    #[test]
    fn test_hash_in_url_fragment_is_kept() {
        let line = "pkg @ https://example.com/pkg.tar.gz#sha256=abc";
        let manifest = DependencyManifest::parse(Path::new("r.txt"), line);
        assert_eq!(manifest.requirements().next(), Some(line));
    }

    #[test]
    fn test_line_continuation() {
        let content = "requests==2.31.0 \\\n    --hash=sha256:abc\nPyYAML\r\n";
        let manifest = DependencyManifest::parse(Path::new("r.txt"), content);
        let reqs: Vec<&str> = manifest.requirements().collect();
        assert_eq!(reqs.len(), 2);
        assert!(reqs[0].starts_with("requests==2.31.0"));
        assert!(reqs[0].ends_with("--hash=sha256:abc"));
        assert_eq!(reqs[1], "PyYAML");
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = DependencyManifest::parse(Path::new("r.txt"), "\n# nothing yet\n\n");
        assert!(manifest.is_empty());
        assert!(manifest.entries().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = DependencyManifest::load(&dir.path().join("requirements.txt")).unwrap_err();
        assert!(matches!(err, VenvError::ManifestNotFound(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, SAMPLE).unwrap();

        let manifest = DependencyManifest::load(&path).unwrap();
        assert_eq!(manifest.path(), path.as_path());
        assert_eq!(manifest.requirement_count(), 3);
    }

    #[test]
    fn test_fingerprint_ignores_comments_and_whitespace() {
        let a = DependencyManifest::parse(Path::new("a"), "requests==2.31.0\nPyYAML\n");
        let b = DependencyManifest::parse(
            Path::new("b"),
            "# header\nrequests==2.31.0   \r\n\nPyYAML  # yaml\n",
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 64);
    }

    #[test]
    fn test_changing_pin_changes_fingerprint() {
        let a = DependencyManifest::parse(Path::new("a"), "requests==2.31.0\n");
        let b = DependencyManifest::parse(Path::new("a"), "requests==2.32.0\n");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_short() {
        let fp = ManifestFingerprint("abc123def456789".to_string());
        assert_eq!(fp.short(), "abc123def456");
    }

    #[test]
    fn test_fingerprint_short_on_char_boundary() {
        let fp = ManifestFingerprint("aéééééééé".to_string());
        assert_eq!(fp.short(), "aéééééééé");

        let fp = ManifestFingerprint("abc".to_string());
        assert_eq!(fp.short(), "abc");
    }
}
