//! Release manifests and their ordering keys
//!
//! A release is a YAML file under the releases directory whose name is its
//! ordering key: `<key>.yaml` with `<key>` a decimal u64. Larger key means
//! newer release. Manifests are immutable once written; rotation only ever
//! adds a new file and deletes old ones. Anything in the directory that
//! does not match the naming scheme is foreign and left untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;
use crate::error::{LarderError, Result};
use crate::store;

/// Format marker written into every manifest.
pub const MANIFEST_API_VERSION: &str = "larder/v1";

const MANIFEST_EXT: &str = "yaml";

/// Serialized body of a release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    pub api_version: String,
    /// RFC 3339 creation time, informational only
    pub created: String,
    /// Contents of the release, in the order the caller supplied them
    pub artifacts: Vec<ArtifactId>,
}

impl ReleaseManifest {
    pub fn new(artifacts: Vec<ArtifactId>) -> Self {
        Self {
            api_version: MANIFEST_API_VERSION.to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            artifacts,
        }
    }

    /// Parse a manifest file. Read failures map to `Io`; parse and
    /// validation failures to `CorruptManifest`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LarderError::io(path, e))?;
        Self::from_yaml(&content).map_err(|reason| LarderError::corrupt(path, reason))
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        let manifest: ReleaseManifest =
            serde_yaml_ng::from_str(content).map_err(|e| e.to_string())?;
        if manifest.api_version != MANIFEST_API_VERSION {
            return Err(format!(
                "unsupported apiVersion {:?}, expected {:?}",
                manifest.api_version, MANIFEST_API_VERSION
            ));
        }
        Ok(manifest)
    }

    /// Write the manifest to `path` via a temp file and an atomic rename.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml_ng::to_string(self).map_err(|e| {
            LarderError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        store::write_atomic(path, yaml.as_bytes()).map_err(|e| LarderError::io(path, e))
    }
}

/// File name for the manifest with the given ordering key.
pub(crate) fn file_name(key: u64) -> String {
    format!("{key}.{MANIFEST_EXT}")
}

/// Extract the ordering key from a manifest file name.
///
/// Only canonical encodings are recognized; `007.yaml` is foreign, not key
/// 7, so a recognized key always round-trips to exactly one file name.
pub(crate) fn parse_file_name(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{MANIFEST_EXT}"))?;
    let key: u64 = stem.parse().ok()?;
    if key.to_string() != stem {
        return None;
    }
    Some(key)
}

/// A release: a parsed manifest plus its on-disk identity.
///
/// Field access goes through methods so the pairing of ordering key and
/// file path stays consistent with what the scan observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    sequence: u64,
    path: PathBuf,
    manifest: ReleaseManifest,
}

impl Release {
    pub(crate) fn new(sequence: u64, path: PathBuf, manifest: ReleaseManifest) -> Self {
        Self {
            sequence,
            path,
            manifest,
        }
    }

    pub(crate) fn read(path: &Path, sequence: u64) -> Result<Self> {
        let manifest = ReleaseManifest::from_file(path)?;
        Ok(Self::new(sequence, path.to_path_buf(), manifest))
    }

    /// Ordering key; strictly larger on newer releases.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// RFC 3339 creation timestamp recorded in the manifest.
    pub fn created(&self) -> &str {
        &self.manifest.created
    }

    /// Artifacts the release consists of, in manifest order.
    pub fn artifacts(&self) -> &[ArtifactId] {
        &self.manifest.artifacts
    }
}

/// Allocates ordering keys for new releases.
///
/// `current` is the highest key on disk, or `None` for an empty history.
/// Implementations must return a key strictly greater than `current`;
/// because retention always keeps the newest manifest, the highest key
/// never regresses and monotonicity holds across the collection's life.
pub trait Sequencer {
    fn next_key(&self, current: Option<u64>) -> u64;
}

/// Default allocator: a plain counter, `current + 1` starting from 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicSequencer;

impl Sequencer for MonotonicSequencer {
    fn next_key(&self, current: Option<u64>) -> u64 {
        match current {
            Some(key) => key.saturating_add(1),
            None => 1,
        }
    }
}

/// Timestamp allocator: unix seconds, bumped past `current` when two
/// rotations land within the same second.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSequencer;

impl Sequencer for ClockSequencer {
    fn next_key(&self, current: Option<u64>) -> u64 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        match current {
            Some(key) if now <= key => key.saturating_add(1),
            _ => now,
        }
    }
}
