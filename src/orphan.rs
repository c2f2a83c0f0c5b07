//! Orphan detection: stored artifacts no release references

use std::collections::HashSet;

use crate::artifact::{ArtifactId, StoredArtifact};
use crate::manifest::Release;

/// Artifact identities referenced by any of the given releases.
pub fn referenced(releases: &[Release]) -> HashSet<&ArtifactId> {
    releases.iter().flat_map(Release::artifacts).collect()
}

/// Stored artifacts whose identity appears in no reference set entry.
///
/// Pure set difference; the order of `stored` is preserved. An artifact
/// referenced by a manifest but missing from the store is not this
/// function's concern, it simply never shows up in `stored`.
pub fn detect(
    stored: Vec<StoredArtifact>,
    referenced: &HashSet<&ArtifactId>,
) -> Vec<StoredArtifact> {
    stored
        .into_iter()
        .filter(|artifact| !referenced.contains(&artifact.id))
        .collect()
}
