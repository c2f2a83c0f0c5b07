//! Artifact identity and the specs that describe a release's contents

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LarderError, Result};

/// Identity of an artifact: a name plus a version.
///
/// Versions are opaque strings compared byte for byte. The collection never
/// interprets them as semver or orders releases by them; release ordering
/// comes from manifest keys alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId {
    pub name: String,
    pub version: String,
}

impl ArtifactId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Input to `add_release`: an artifact identity plus where to fetch its
/// content when the store does not already hold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    pub name: String,
    pub version: String,
    /// Source location, consulted only when the artifact is absent
    pub url: String,
    /// Optional `sha256:<hex>` checksum, verified after fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ArtifactSpec {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: url.into(),
            digest: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn id(&self) -> ArtifactId {
        ArtifactId::new(self.name.clone(), self.version.clone())
    }

    /// Check that name and version can serve as single path components
    /// under the store root.
    ///
    /// Dot-prefixed values are rejected as well: the store treats hidden
    /// entries as foreign, so an artifact stored under one could never be
    /// scanned back.
    pub fn validate(&self) -> Result<()> {
        if let Err(reason) = validate_component(&self.name) {
            return Err(self.invalid(reason));
        }
        if let Err(reason) = validate_component(&self.version) {
            return Err(self.invalid(reason));
        }
        if self.url.is_empty() {
            return Err(self.invalid("url must not be empty"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> LarderError {
        LarderError::InvalidSpec {
            name: self.name.clone(),
            version: self.version.clone(),
            reason: reason.to_string(),
        }
    }
}

fn validate_component(value: &str) -> std::result::Result<(), &'static str> {
    if value.is_empty() {
        return Err("name and version must not be empty");
    }
    if value.starts_with('.') {
        return Err("name and version must not start with '.'");
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err("name and version must not contain path separators");
    }
    Ok(())
}

/// An artifact physically present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub id: ArtifactId,
    /// Absolute or collection-relative location of the content
    pub path: PathBuf,
}
