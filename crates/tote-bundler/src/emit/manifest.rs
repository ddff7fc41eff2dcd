//! The build manifest and the failure marker.
//!
//! `manifest.json` maps every source (and plugin artifact) to its emitted
//! file. It is published last, through a temporary file and a rename, so its
//! presence means the whole build succeeded. A failed build removes any stale
//! manifest and leaves a `BUILD_FAILED` marker instead.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::writer::write_atomic;
use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FAILURE_MARKER: &str = "BUILD_FAILED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Path relative to the output directory, `/`-separated
    pub output_path: String,
    /// BLAKE3 hex digest of the emitted bytes
    pub hash: String,
    pub size: u64,
}

/// Source path -> emitted artifact, sorted by source path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(source.into(), entry);
    }

    pub fn get(&self, source: &str) -> Option<&ManifestEntry> {
        self.entries.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(source, entry)| (source.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all emitted sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|entry| entry.size).sum()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Read a published manifest.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Atomically publish `manifest.json` in `out_dir` and clear a stale failure marker.
    pub fn publish(&self, out_dir: &Path) -> Result<PathBuf> {
        let path = out_dir.join(MANIFEST_FILE);
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        write_atomic(&path, json.as_bytes())?;
        remove_if_exists(&out_dir.join(FAILURE_MARKER))?;
        tracing::debug!(path = %path.display(), entries = self.len(), "manifest published");
        Ok(path)
    }

    /// Remove a manifest left over from an earlier build.
    pub fn remove_stale(out_dir: &Path) -> Result<()> {
        remove_if_exists(&out_dir.join(MANIFEST_FILE))
    }
}

/// Contents of the `BUILD_FAILED` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMarker {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl FailureMarker {
    pub fn from_error(error: &Error) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            file: error.file(),
        }
    }

    pub fn write(&self, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(FAILURE_MARKER);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }

    pub fn read(out_dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(out_dir.join(FAILURE_MARKER))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(output: &str) -> ManifestEntry {
        ManifestEntry {
            output_path: output.to_string(),
            hash: "ab".repeat(32),
            size: 12,
        }
    }

    #[test]
    fn serializes_as_sorted_object() {
        let mut manifest = Manifest::new();
        manifest.insert("src/b.js", entry("b.js"));
        manifest.insert("src/a.js", entry("a.js"));

        let json = manifest.to_json_pretty().unwrap();
        let a = json.find("src/a.js").unwrap();
        let b = json.find("src/b.js").unwrap();
        assert!(a < b);
        assert!(json.contains("\"outputPath\": \"a.js\""));
    }

    #[test]
    fn publish_replaces_failure_marker() {
        let dir = TempDir::new().unwrap();
        FailureMarker {
            kind: "TransformError".to_string(),
            message: "boom".to_string(),
            file: None,
        }
        .write(dir.path())
        .unwrap();

        let mut manifest = Manifest::new();
        manifest.insert("src/a.js", entry("a.js"));
        let path = manifest.publish(dir.path()).unwrap();

        assert_eq!(Manifest::read(&path).unwrap(), manifest);
        assert!(!dir.path().join(FAILURE_MARKER).exists());
    }

    #[test]
    fn remove_stale_is_quiet_when_missing() {
        let dir = TempDir::new().unwrap();
        Manifest::remove_stale(dir.path()).unwrap();
    }
}
