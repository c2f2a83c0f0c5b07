//! Larder - On-disk release collections
//!
//! This crate manages a directory tree holding versioned artifact content,
//! a bounded history of release manifests, and a pointer to the current
//! release.
//!
//! # Overview
//!
//! A collection lets deployment tooling:
//! - Publish releases whose artifact content is fetched once and shared
//! - Keep a bounded, strictly ordered release history
//! - Atomically advance a `latest` pointer to the current release
//! - Reap stored artifacts no retained release references
//!
//! # Layout
//!
//! ```text
//! <root>/
//!     ├── artifacts/<name>/<version>  ← content, stored once, shared
//!     ├── releases/<key>.yaml         ← one immutable manifest per release
//!     └── latest                      ← pointer to the current manifest
//! ```
//!
//! [`Collection::add_release`] drives a rotation: missing artifact content
//! is fetched and committed, a manifest is written under the next ordering
//! key, the latest pointer is atomically advanced, manifests beyond the
//! retention window are pruned, and orphaned artifacts are reaped. Every
//! visible mutation happens through a rename, so a crash mid-rotation never
//! corrupts the published history, it only leaves files a later rotation
//! cleans up.

pub mod artifact;
pub mod collection;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod orphan;
pub mod retention;
pub mod store;

pub use artifact::{ArtifactId, ArtifactSpec, StoredArtifact};
pub use collection::{Collection, Rotation};
pub use config::{
    CollectionConfig, CollectionOptions, CollectionPaths, PathOverrides, DEFAULT_RETENTION,
};
pub use error::{CleanupError, LarderError, Result};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{FetchError, Fetcher};
pub use manifest::{
    ClockSequencer, MonotonicSequencer, Release, ReleaseManifest, Sequencer, MANIFEST_API_VERSION,
};
pub use retention::RetentionPolicy;
pub use store::ArtifactStore;
