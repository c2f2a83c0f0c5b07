//! Collection configuration: directory layout and rotation options
//!
//! Nothing in the crate consults the process working directory. Callers
//! hand over explicit paths, either one by one or derived from a root via
//! [`CollectionPaths::for_root`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LarderError, Result};

/// Number of previous releases kept alongside the newest by default.
pub const DEFAULT_RETENTION: usize = 5;

/// On-disk layout of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPaths {
    /// Artifact content, one entry per `<name>/<version>`
    pub artifacts: PathBuf,
    /// Release manifests, one `<key>.yaml` file per release
    pub releases: PathBuf,
    /// The latest-release pointer
    pub latest: PathBuf,
}

impl CollectionPaths {
    /// The conventional layout under a collection root:
    /// `artifacts/`, `releases/` and `latest` as siblings.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            artifacts: root.join("artifacts"),
            releases: root.join("releases"),
            latest: root.join("latest"),
        }
    }
}

/// Rotation options for `add_release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionOptions {
    /// Number of previous releases kept alongside the newest
    pub retention: usize,
    /// Whether rotation deletes artifacts no surviving release references
    pub reap: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            reap: true,
        }
    }
}

/// Per-directory overrides from a configuration file.
///
/// Entries left unset keep the conventional layout under the resolved
/// root, so a file can relocate a single directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathOverrides {
    pub artifacts: Option<PathBuf>,
    pub releases: Option<PathBuf>,
    pub latest: Option<PathBuf>,
}

impl PathOverrides {
    /// Apply the set entries on top of a base layout.
    pub fn apply_to(&self, base: &mut CollectionPaths) {
        if let Some(artifacts) = &self.artifacts {
            base.artifacts = artifacts.clone();
        }
        if let Some(releases) = &self.releases {
            base.releases = releases.clone();
        }
        if let Some(latest) = &self.latest {
            base.latest = latest.clone();
        }
    }
}

/// Optional YAML configuration file consumed by the CLI.
///
/// Everything in it can also be given on the command line; flags win over
/// file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionConfig {
    /// Collection root the conventional layout hangs off
    pub root: Option<PathBuf>,
    /// Per-directory overrides applied on top of the root layout
    pub paths: Option<PathOverrides>,
    pub options: CollectionOptions,
}

impl CollectionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LarderError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_yaml_ng::from_str(&content).map_err(|e| LarderError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Resolve the effective layout: the conventional layout under the
    /// file's root (or the fallback), with any `paths` entries applied
    /// on top.
    pub fn resolve_paths(&self, fallback_root: &Path) -> CollectionPaths {
        let root = self.root.as_deref().unwrap_or(fallback_root);
        let mut paths = CollectionPaths::for_root(root);
        if let Some(overrides) = &self.paths {
            overrides.apply_to(&mut paths);
        }
        paths
    }
}
