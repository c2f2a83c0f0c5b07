//! On-disk artifact storage keyed by name and version
//!
//! Layout is `<root>/<name>/<version>`, one entry per stored artifact.
//! Content is written once, via a hidden temp file and an atomic rename,
//! and never mutated afterwards; only orphan reaping removes it. Entries
//! the scheme does not recognize, dot-prefixed names and stray files
//! directly under the root, are invisible to scans and never deleted.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifact::{ArtifactId, ArtifactSpec, StoredArtifact};
use crate::error::{LarderError, Result};
use crate::fetch::{self, Fetcher};

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the given artifact lives, whether or not it is present.
    pub fn path_for(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(&id.name).join(&id.version)
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.path_for(id).exists()
    }

    /// Make sure the artifact described by `spec` is present, fetching and
    /// committing its content if it is not.
    ///
    /// Present artifacts are returned as-is without consulting the fetcher,
    /// even when the spec carries a different URL or digest. On any error
    /// the store is unchanged.
    pub fn ensure(&self, spec: &ArtifactSpec, fetcher: &dyn Fetcher) -> Result<StoredArtifact> {
        spec.validate()?;
        let id = spec.id();
        let path = self.path_for(&id);
        if path.exists() {
            debug!("Artifact {} already stored, skipping fetch", id);
            return Ok(StoredArtifact { id, path });
        }

        info!("Fetching artifact {} from {}", id, spec.url);
        let bytes = fetcher.fetch(&spec.url).map_err(|source| LarderError::Fetch {
            name: spec.name.clone(),
            version: spec.version.clone(),
            source,
        })?;

        if let Some(expected) = &spec.digest {
            fetch::verify_digest(&spec.url, &bytes, expected).map_err(|source| {
                LarderError::Fetch {
                    name: spec.name.clone(),
                    version: spec.version.clone(),
                    source,
                }
            })?;
        }

        let parent = self.root.join(&id.name);
        fs::create_dir_all(&parent).map_err(|e| LarderError::io(&parent, e))?;
        write_atomic(&path, &bytes).map_err(|e| LarderError::io(&path, e))?;
        debug!("Stored artifact {} ({} bytes)", id, bytes.len());
        Ok(StoredArtifact { id, path })
    }

    /// Every recognized artifact in the store, sorted by name then version.
    ///
    /// A missing root is an empty store. Unrecognized entries are skipped,
    /// never an error.
    pub fn scan(&self) -> Result<Vec<StoredArtifact>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }

        for entry in fs::read_dir(&self.root).map_err(|e| LarderError::io(&self.root, e))? {
            let entry = entry.map_err(|e| LarderError::io(&self.root, e))?;
            let Some(name) = recognized_component(&entry) else {
                continue;
            };
            let file_type = entry
                .file_type()
                .map_err(|e| LarderError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                debug!("Ignoring stray entry {} in artifact store", name);
                continue;
            }

            let name_dir = entry.path();
            let versions = fs::read_dir(&name_dir).map_err(|e| LarderError::io(&name_dir, e))?;
            for version_entry in versions {
                let version_entry = version_entry.map_err(|e| LarderError::io(&name_dir, e))?;
                let Some(version) = recognized_component(&version_entry) else {
                    continue;
                };
                found.push(StoredArtifact {
                    id: ArtifactId::new(name.clone(), version),
                    path: version_entry.path(),
                });
            }
        }

        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    /// Delete a stored artifact, pruning its name directory if that leaves
    /// it empty. Used by orphan reaping.
    pub(crate) fn remove(&self, artifact: &StoredArtifact) -> std::io::Result<()> {
        let path = &artifact.path;
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }

        if let Some(parent) = path.parent() {
            if parent != self.root && dir_is_empty(parent) {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

/// File name of a directory entry, or `None` for dot-prefixed and non-UTF-8
/// names, which the store treats as foreign.
fn recognized_component(entry: &fs::DirEntry) -> Option<String> {
    let name = entry.file_name();
    let name = name.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}

/// Write `bytes` to `path` through a dot-prefixed temp file in the same
/// directory and an atomic rename, so an interrupted write leaves only an
/// entry scans ignore and readers never observe partial content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = path.with_file_name(format!(".{name}.tmp"));

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingFetcher {
        calls: Cell<usize>,
        fail: bool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Cell::new(0),
                fail: true,
            }
        }
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(format!("content of {url}").into_bytes())
        }
    }

    fn spec(name: &str, version: &str) -> ArtifactSpec {
        ArtifactSpec::new(name, version, format!("https://example.com/{name}-{version}"))
    }

    #[test]
    fn test_ensure_fetches_and_stores_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::new();

        let stored = store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap();
        assert_eq!(stored.path, dir.path().join("app").join("2.0.0"));
        assert_eq!(fetcher.calls.get(), 1);
        let content = fs::read_to_string(&stored.path).unwrap();
        assert_eq!(content, "content of https://example.com/app-2.0.0");
    }

    #[test]
    fn test_ensure_skips_fetch_when_present() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::new();

        store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap();
        store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap();
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn test_ensure_fetch_failure_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::failing();

        let err = store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap_err();
        assert!(matches!(err, LarderError::Fetch { .. }));
        assert!(!store.contains(&ArtifactId::new("app", "2.0.0")));
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_digest_mismatch_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::new();

        let bad = spec("app", "2.0.0").with_digest("sha256:deadbeef");
        let err = store.ensure(&bad, &fetcher).unwrap_err();
        match err {
            LarderError::Fetch { source, .. } => {
                assert!(matches!(source, FetchError::DigestMismatch { .. }))
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert!(!store.contains(&ArtifactId::new("app", "2.0.0")));
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let store = ArtifactStore::new("/nonexistent/larder-store");
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_skips_unrecognized_entries() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app").join("2.0.0"), b"x").unwrap();
        // foreign material the scan must ignore
        fs::write(dir.path().join("README"), b"stray file at root").unwrap();
        fs::write(dir.path().join("app").join(".2.0.1.tmp"), b"partial").unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();

        let stored = store.scan().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, ArtifactId::new("app", "2.0.0"));
    }

    #[test]
    fn test_scan_sorted_by_name_then_version() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        for (name, version) in [("b", "1.0.0"), ("a", "2.0.0"), ("a", "1.0.0")] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join(version), b"x").unwrap();
        }

        let ids: Vec<_> = store.scan().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(
            ids,
            vec![
                ArtifactId::new("a", "1.0.0"),
                ArtifactId::new("a", "2.0.0"),
                ArtifactId::new("b", "1.0.0"),
            ]
        );
    }

    #[test]
    fn test_remove_prunes_empty_name_directory() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::new();

        let stored = store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap();
        store.remove(&stored).unwrap();
        assert!(!dir.path().join("app").exists());
    }

    #[test]
    fn test_remove_keeps_directory_with_other_versions() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fetcher = CountingFetcher::new();

        let old = store.ensure(&spec("app", "1.0.0"), &fetcher).unwrap();
        store.ensure(&spec("app", "2.0.0"), &fetcher).unwrap();
        store.remove(&old).unwrap();
        assert!(store.contains(&ArtifactId::new("app", "2.0.0")));
        assert!(!store.contains(&ArtifactId::new("app", "1.0.0")));
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload");
        write_atomic(&path, b"data").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("payload")]);
        assert_eq!(fs::read(&path).unwrap(), b"data");
    }
}
