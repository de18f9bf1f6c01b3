//! The manifest: fingerprint → paths sharing that content.
//!
//! A manifest is the only persisted state of a packed folder. Each entry maps
//! a content fingerprint to the ordered list of relative paths that held that
//! content before packing. The first path of a list is the *representative*:
//! the one physical copy kept on disk.
//!
//! Invariants, checked by [`Manifest::validate`] whenever a manifest is loaded:
//! - every list is non-empty;
//! - no path appears under two fingerprints;
//! - no path climbs out of the folder through a `..` segment.
//!
//! # Submodules
//!
//! - [`builder`]: builds a manifest from a [`FileInventory`](crate::scanner::FileInventory)
//! - [`io`]: reads and writes `Manifest.json`

pub mod builder;
pub mod io;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::has_parent_segment;
use crate::scanner::Fingerprint;

pub use builder::{BuildError, ManifestBuilder};
pub use io::{manifest_exists, manifest_path, MANIFEST_FILE_NAME};

/// Mapping from content fingerprint to the relative paths sharing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    groups: BTreeMap<Fingerprint, Vec<String>>,
}

/// Borrowed view of one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestGroup<'a> {
    /// Content fingerprint shared by every path of the group
    pub fingerprint: &'a str,
    /// Relative paths, representative first
    pub paths: &'a [String],
}

impl<'a> ManifestGroup<'a> {
    /// The path kept on disk while packed.
    #[must_use]
    pub fn representative(&self) -> &'a str {
        &self.paths[0]
    }

    /// Paths removed by packing and recreated by unpacking.
    #[must_use]
    pub fn duplicates(&self) -> &'a [String] {
        &self.paths[1..]
    }
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as holding content `fingerprint`.
    ///
    /// Paths are kept in insertion order, so the first path recorded for a
    /// fingerprint becomes its representative.
    pub(crate) fn insert(&mut self, fingerprint: Fingerprint, path: String) {
        self.groups.entry(fingerprint).or_default().push(path);
    }

    /// Iterate over all groups in fingerprint order.
    pub fn groups(&self) -> impl ExactSizeIterator<Item = ManifestGroup<'_>> {
        self.groups.iter().map(|(fingerprint, paths)| ManifestGroup {
            fingerprint,
            paths,
        })
    }

    /// Paths recorded for a fingerprint.
    #[must_use]
    pub fn paths(&self, fingerprint: &str) -> Option<&[String]> {
        self.groups.get(fingerprint).map(Vec::as_slice)
    }

    /// Fingerprint recorded for a relative path.
    #[must_use]
    pub fn fingerprint_of(&self, path: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, paths)| paths.iter().any(|p| p == path))
            .map(|(fingerprint, _)| fingerprint.as_str())
    }

    /// Number of fingerprint groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if the manifest has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of paths across all groups.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Number of paths that are not representatives.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.file_count() - self.len()
    }

    /// Check the manifest invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::EmptyGroup`] for a fingerprint without paths and
    /// [`ManifestError::OverlappingPath`] for a path listed twice.
    /// [`ManifestError::ParentSegment`] is returned for a path containing `..`.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = HashSet::new();
        for (fingerprint, paths) in &self.groups {
            if paths.is_empty() {
                return Err(ManifestError::EmptyGroup(fingerprint.clone()));
            }
            for path in paths {
                if has_parent_segment(path) {
                    return Err(ManifestError::ParentSegment(path.clone()));
                }
                if Path::new(path).is_absolute() {
                    log::warn!("Manifest entry {} lies outside the packed folder", path);
                }
                if !seen.insert(path.as_str()) {
                    return Err(ManifestError::OverlappingPath(path.clone()));
                }
            }
        }
        Ok(())
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Serialize`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)
    }

    /// Deserialize from JSON bytes and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed JSON and a validation
    /// error if the invariants do not hold.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_slice(bytes).map_err(ManifestError::Parse)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

/// Errors raised while handling manifests.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// A fingerprint maps to an empty path list.
    #[error("manifest entry {0} has no paths")]
    EmptyGroup(String),

    /// A path is listed more than once.
    #[error("manifest lists path {0} more than once")]
    OverlappingPath(String),

    /// A path steps into a parent directory.
    #[error("manifest path {0} contains a '..' segment")]
    ParentSegment(String),

    /// The manifest text is not a valid manifest.
    #[error("manifest is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    /// The manifest could not be encoded.
    #[error("failed to encode manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The manifest file could not be read or written.
    #[error("manifest I/O error for {path}: {source}")]
    Io {
        /// Path of the manifest file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
