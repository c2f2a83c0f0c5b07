//! The collection: release history queries and the add-release rotation
//!
//! A collection is three locations (artifact store, releases directory,
//! latest pointer) plus rotation options. All operations are synchronous
//! and assume a single writer; readers may run concurrently because every
//! visible mutation happens through an atomic rename.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::artifact::{ArtifactId, ArtifactSpec, StoredArtifact};
use crate::config::{CollectionOptions, CollectionPaths};
use crate::error::{CleanupError, LarderError, Result};
use crate::fetch::Fetcher;
use crate::manifest::{self, MonotonicSequencer, Release, ReleaseManifest, Sequencer};
use crate::orphan;
use crate::retention::RetentionPolicy;
use crate::store::ArtifactStore;

/// Outcome of a successful `add_release` rotation.
///
/// The release is committed before retention and reaping run. Failures in
/// those cleanup steps never unwind it; they are collected here and the
/// affected files linger until a later rotation retries them.
#[derive(Debug)]
pub struct Rotation {
    /// The newly created, now current release
    pub release: Release,
    /// Manifest files deleted by retention
    pub pruned: Vec<PathBuf>,
    /// Artifacts deleted by reaping
    pub reaped: Vec<StoredArtifact>,
    /// Secondary failures from pruning and reaping
    pub cleanup_errors: Vec<CleanupError>,
}

impl Rotation {
    pub fn is_clean(&self) -> bool {
        self.cleanup_errors.is_empty()
    }
}

pub struct Collection {
    paths: CollectionPaths,
    options: CollectionOptions,
    store: ArtifactStore,
    sequencer: Box<dyn Sequencer>,
}

impl Collection {
    pub fn open(paths: CollectionPaths, options: CollectionOptions) -> Self {
        let store = ArtifactStore::new(paths.artifacts.clone());
        Self {
            paths,
            options,
            store,
            sequencer: Box::new(MonotonicSequencer),
        }
    }

    /// Replace the ordering-key allocator, e.g. with [`ClockSequencer`]
    /// for timestamp-named manifests.
    ///
    /// [`ClockSequencer`]: crate::manifest::ClockSequencer
    pub fn with_sequencer(mut self, sequencer: impl Sequencer + 'static) -> Self {
        self.sequencer = Box::new(sequencer);
        self
    }

    pub fn paths(&self) -> &CollectionPaths {
        &self.paths
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// All releases, newest first.
    ///
    /// A missing or empty releases directory is an empty history. Entries
    /// that do not look like release manifests are skipped; a recognized
    /// manifest that fails to parse fails the whole call, surfacing the
    /// corruption instead of silently shrinking the history.
    pub fn releases(&self) -> Result<Vec<Release>> {
        let dir = &self.paths.releases;
        let mut releases = Vec::new();
        if !dir.exists() {
            return Ok(releases);
        }

        for entry in fs::read_dir(dir).map_err(|e| LarderError::io(dir, e))? {
            let entry = entry.map_err(|e| LarderError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| LarderError::io(&path, e))?;
            if !file_type.is_file() {
                debug!("Ignoring non-file entry {} in releases directory", path.display());
                continue;
            }
            let Some(sequence) = manifest::parse_file_name(&path) else {
                debug!("Ignoring unrecognized entry {} in releases directory", path.display());
                continue;
            };
            releases.push(Release::read(&path, sequence)?);
        }

        releases.sort_by(|a, b| b.sequence().cmp(&a.sequence()));
        Ok(releases)
    }

    /// Stored artifacts referenced by no release, sorted by identity.
    ///
    /// With no releases at all, every stored artifact is an orphan.
    pub fn orphans(&self) -> Result<Vec<StoredArtifact>> {
        let releases = self.releases()?;
        let referenced = orphan::referenced(&releases);
        Ok(orphan::detect(self.store.scan()?, &referenced))
    }

    /// The release the latest pointer refers to, or `None` when the
    /// pointer does not exist yet.
    ///
    /// Both pointer encodings are understood on every platform: a symlink
    /// to the manifest and a marker file holding its path.
    pub fn latest(&self) -> Result<Option<Release>> {
        let pointer = &self.paths.latest;
        let target = match fs::read_link(pointer) {
            Ok(target) => target,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            // Not a symlink (or unreadable): try the marker form and let
            // its error surface if the pointer is truly inaccessible.
            Err(_) => {
                let content =
                    fs::read_to_string(pointer).map_err(|e| LarderError::io(pointer, e))?;
                PathBuf::from(content.trim())
            }
        };

        let resolved = if target.is_absolute() {
            target
        } else {
            match pointer.parent() {
                Some(dir) => dir.join(&target),
                None => target,
            }
        };
        let Some(sequence) = manifest::parse_file_name(&resolved) else {
            return Err(LarderError::corrupt(
                &resolved,
                "latest pointer does not name a release manifest",
            ));
        };
        Release::read(&resolved, sequence).map(Some)
    }

    /// Publish a new release composed of `specs` and rotate the history.
    ///
    /// In order: missing artifact content is fetched and committed, a new
    /// manifest is written under the next ordering key, the latest pointer
    /// is atomically advanced (the commit point), manifests beyond the
    /// retention window are pruned, and, when reaping is enabled, artifacts
    /// no surviving manifest references are deleted.
    ///
    /// Any error before the pointer advances aborts the release; the
    /// history and pointer are left as they were, though content fetched
    /// for earlier specs stays in the store until a later rotation reaps
    /// it. Errors after the pointer advances are cleanup failures and are
    /// reported on the returned [`Rotation`] instead.
    pub fn add_release(&self, specs: &[ArtifactSpec], fetcher: &dyn Fetcher) -> Result<Rotation> {
        for spec in specs {
            spec.validate()?;
        }
        for spec in specs {
            self.store.ensure(spec, fetcher)?;
        }

        let prior = self.releases()?;
        let key = self.sequencer.next_key(prior.first().map(Release::sequence));
        let path = self.paths.releases.join(manifest::file_name(key));
        if path.exists() {
            return Err(LarderError::io(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "ordering key already taken",
                ),
            ));
        }
        fs::create_dir_all(&self.paths.releases)
            .map_err(|e| LarderError::io(&self.paths.releases, e))?;
        let body = ReleaseManifest::new(specs.iter().map(ArtifactSpec::id).collect());
        body.write_to(&path)?;
        let release = Release::new(key, path, body);
        info!("Created release {} with {} artifacts", key, specs.len());

        // The pointer swap is the commit point. Failure unwinds the
        // manifest file; success means the release stands no matter what
        // cleanup below runs into.
        if let Err(e) = self.advance_latest(&release) {
            let _ = fs::remove_file(release.path());
            return Err(e);
        }

        let mut all = prior;
        all.insert(0, release.clone());

        let policy = RetentionPolicy::new(self.options.retention);
        let (kept, dropped) = policy.partition(&all);
        let mut pruned = Vec::new();
        let mut reaped = Vec::new();
        let mut cleanup_errors = Vec::new();

        // A manifest that refuses to die keeps counting as a reference
        // holder, so its artifacts stay safe from the reaper below.
        let mut survivors: Vec<&Release> = kept.iter().collect();
        for stale in dropped {
            match fs::remove_file(stale.path()) {
                Ok(()) => {
                    debug!("Pruned release {}", stale.sequence());
                    pruned.push(stale.path().to_path_buf());
                }
                Err(e) => {
                    warn!(
                        "Failed to remove stale manifest {}: {}",
                        stale.path().display(),
                        e
                    );
                    cleanup_errors.push(CleanupError::Manifest {
                        path: stale.path().to_path_buf(),
                        source: e,
                    });
                    survivors.push(stale);
                }
            }
        }

        if self.options.reap {
            let referenced: HashSet<&ArtifactId> = survivors
                .iter()
                .flat_map(|release| release.artifacts())
                .collect();
            match self.store.scan() {
                Ok(stored) => {
                    for artifact in orphan::detect(stored, &referenced) {
                        match self.store.remove(&artifact) {
                            Ok(()) => {
                                debug!("Reaped orphaned artifact {}", artifact.id);
                                reaped.push(artifact);
                            }
                            Err(e) => {
                                warn!(
                                    "Failed to reap artifact {} at {}: {}",
                                    artifact.id,
                                    artifact.path.display(),
                                    e
                                );
                                cleanup_errors.push(CleanupError::Artifact {
                                    id: artifact.id.clone(),
                                    path: artifact.path.clone(),
                                    source: e,
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping artifact reaping, store scan failed: {}", e);
                    cleanup_errors.push(CleanupError::Scan {
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Rotation {
            release,
            pruned,
            reaped,
            cleanup_errors,
        })
    }

    /// Point `latest` at the release's manifest via a temp link and an
    /// atomic rename, so readers observe either the old target or the new
    /// one, never an absent or half-written pointer.
    fn advance_latest(&self, release: &Release) -> Result<()> {
        let pointer = &self.paths.latest;
        if let Some(parent) = pointer.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LarderError::io(parent, e))?;
            }
        }
        let target = self.pointer_target(release);

        #[cfg(unix)]
        {
            let name = pointer
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "latest".to_string());
            let tmp = pointer.with_file_name(format!(".{name}.tmp"));
            let _ = fs::remove_file(&tmp);
            std::os::unix::fs::symlink(&target, &tmp).map_err(|e| LarderError::io(&tmp, e))?;
            if let Err(e) = fs::rename(&tmp, pointer) {
                let _ = fs::remove_file(&tmp);
                return Err(LarderError::io(pointer, e));
            }
        }

        #[cfg(not(unix))]
        {
            let encoded = target.to_string_lossy();
            crate::store::write_atomic(pointer, encoded.as_bytes())
                .map_err(|e| LarderError::io(pointer, e))?;
        }

        debug!("Latest pointer now {}", target.display());
        Ok(())
    }

    /// Pointer target for a release: relative to the pointer's directory
    /// when the manifest lives under it, keeping the collection
    /// relocatable, absolute otherwise.
    fn pointer_target(&self, release: &Release) -> PathBuf {
        let manifest_path = release.path();
        match self.paths.latest.parent() {
            Some(dir) => manifest_path
                .strip_prefix(dir)
                .map(|relative| relative.to_path_buf())
                .unwrap_or_else(|_| manifest_path.to_path_buf()),
            None => manifest_path.to_path_buf(),
        }
    }
}
