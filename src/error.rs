//! Error types for collection operations

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::artifact::ArtifactId;
use crate::fetch::FetchError;

/// Errors surfaced by collection operations.
#[derive(Error, Debug)]
pub enum LarderError {
    /// A recognized release manifest could not be parsed or failed validation
    #[error("Corrupt release manifest at {path}: {reason}")]
    CorruptManifest { path: PathBuf, reason: String },

    /// Artifact content could not be obtained; nothing was committed
    #[error("Failed to fetch artifact {name} {version}")]
    Fetch {
        name: String,
        version: String,
        #[source]
        source: FetchError,
    },

    /// Filesystem failure while reading or writing collection state
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact spec whose name or version cannot form a store path
    #[error("Invalid artifact spec {name} {version}: {reason}")]
    InvalidSpec {
        name: String,
        version: String,
        reason: String,
    },

    /// A configuration file could not be read or parsed
    #[error("Configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl LarderError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LarderError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        LarderError::CorruptManifest {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Secondary failures during retention pruning or orphan reaping.
///
/// These occur after the new release has been committed, so they are
/// collected on the rotation outcome instead of failing the call. The
/// affected files linger until the next rotation retries them.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// A manifest past the retention window could not be deleted
    #[error("Failed to remove stale manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An orphaned artifact could not be deleted from the store
    #[error("Failed to reap orphaned artifact {id} at {path}")]
    Artifact {
        id: ArtifactId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store could not be rescanned, so reaping was skipped entirely
    #[error("Skipped artifact reaping: {reason}")]
    Scan { reason: String },
}

pub type Result<T> = std::result::Result<T, LarderError>;
