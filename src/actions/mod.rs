//! Pack and unpack engines.
//!
//! This module provides the two transforms over a folder:
//! - [`pack`]: collapse every group of identical files to one representative
//!   and persist a [`Manifest`]
//! - [`unpack`]: recreate every duplicate from its representative and remove
//!   the manifest
//!
//! Manifest groups are processed concurrently on a dedicated rayon pool. Work
//! inside one group is sequential: a representative is always confirmed on
//! disk before anything in its group is deleted. A failing group does not
//! stop the others; all failures are collected into
//! [`ActionError::GroupsFailed`].
//!
//! ```no_run
//! use packrat::actions::{PackEngine, UnpackEngine};
//! use packrat::scanner::{FileInventory, MatcherConfig};
//! use std::path::Path;
//!
//! let folder = Path::new("/data/assets");
//! let inventory = FileInventory::from_directory(folder, &MatcherConfig::default())?;
//! PackEngine::new().pack_inventory(&inventory, folder)?;
//! UnpackEngine::new().unpack(folder)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod pack;
pub mod unpack;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::manifest::{BuildError, Manifest, ManifestError, ManifestGroup, MANIFEST_FILE_NAME};
use crate::pool::build_pool;
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::same_location;

pub use pack::{PackConfig, PackEngine, PackOutcome, PackSummary};
pub use unpack::{UnpackEngine, UnpackOutcome, UnpackSummary};

/// Filesystem step that failed inside a manifest group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// Creating a parent directory
    CreateDir,
    /// Copying the representative
    Copy,
    /// Deleting a duplicate
    Delete,
    /// Checking that the representative is present
    Verify,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir => write!(f, "create directory"),
            Self::Copy => write!(f, "copy to"),
            Self::Delete => write!(f, "delete"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// Failure of one manifest group.
#[derive(Debug, Error)]
#[error("group {fingerprint}: {operation} {}: {source}", path.display())]
pub struct GroupFailure {
    /// Fingerprint of the failed group
    pub fingerprint: String,
    /// Step that failed
    pub operation: FileOperation,
    /// Path the step operated on
    pub path: PathBuf,
    /// The underlying I/O error
    #[source]
    pub source: io::Error,
}

impl GroupFailure {
    fn new(fingerprint: &str, operation: FileOperation, path: &Path, source: io::Error) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Error type for pack and unpack operations.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The folder to operate on does not exist.
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// The folder to operate on is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Source and destination contain one another.
    #[error("Destination {destination} overlaps source {source_dir}; clearing it would destroy source files")]
    OverlappingFolders {
        /// Source folder
        source_dir: PathBuf,
        /// Destination folder
        destination: PathBuf,
    },

    /// The manifest records a file where the manifest itself must live.
    #[error("Cannot pack a file named {0} at the folder root")]
    ReservedPath(String),

    /// A removed directory stayed visible for too long.
    #[error("Timed out waiting for {path} to be removed after {attempts} attempts")]
    RemovalTimeout {
        /// Directory being removed
        path: PathBuf,
        /// Number of polls performed
        attempts: u32,
    },

    /// An I/O error outside of group processing.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// One or more manifest groups failed.
    #[error(
        "{} of {} group(s) failed; first failure: {}",
        .failures.len(),
        .total,
        .failures.first().map_or_else(String::new, ToString::to_string)
    )]
    GroupsFailed {
        /// Every group failure
        failures: Vec<GroupFailure>,
        /// Number of groups processed
        total: usize,
    },

    /// The manifest could not be read, validated or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The manifest could not be built.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ActionError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io { path, source }
    }
}

/// Ensure `folder` exists and is a directory.
pub(crate) fn require_directory(folder: &Path) -> Result<(), ActionError> {
    if !folder.exists() {
        return Err(ActionError::FolderNotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ActionError::NotADirectory(folder.to_path_buf()));
    }
    Ok(())
}

/// Reject manifests that would collide with the manifest file itself.
pub(crate) fn check_reserved_paths(manifest: &Manifest) -> Result<(), ActionError> {
    match manifest.fingerprint_of(MANIFEST_FILE_NAME) {
        Some(_) => Err(ActionError::ReservedPath(MANIFEST_FILE_NAME.to_string())),
        None => Ok(()),
    }
}

/// Copy `from` to `to`, creating parent directories and overwriting `to`.
pub(crate) fn copy_file(fingerprint: &str, from: &Path, to: &Path) -> Result<u64, GroupFailure> {
    // Copying a file onto another name for itself would truncate it
    if from == to || same_location(from, to) {
        return verify_file(fingerprint, from);
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| GroupFailure::new(fingerprint, FileOperation::CreateDir, parent, e))?;
    }
    log::trace!("Copying {} -> {}", from.display(), to.display());
    fs::copy(from, to).map_err(|e| GroupFailure::new(fingerprint, FileOperation::Copy, to, e))
}

/// Fail unless `path` is an existing regular file.
pub(crate) fn verify_file(fingerprint: &str, path: &Path) -> Result<u64, GroupFailure> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(GroupFailure::new(
            fingerprint,
            FileOperation::Verify,
            path,
            io::Error::other("not a regular file"),
        )),
        Err(e) => Err(GroupFailure::new(fingerprint, FileOperation::Verify, path, e)),
    }
}

/// Delete a single file.
pub(crate) fn delete_file(fingerprint: &str, path: &Path) -> Result<(), GroupFailure> {
    log::trace!("Deleting {}", path.display());
    fs::remove_file(path).map_err(|e| GroupFailure::new(fingerprint, FileOperation::Delete, path, e))
}

/// Run `task` for every manifest group on a dedicated pool.
///
/// Returns the per-group results in group order, or every failure at once.
pub(crate) fn run_groups<T, F>(
    manifest: &Manifest,
    threads: usize,
    phase: &'static str,
    progress_callback: Option<&Arc<dyn ProgressCallback>>,
    task: F,
) -> Result<Vec<T>, ActionError>
where
    T: Send,
    F: Fn(ManifestGroup<'_>) -> Result<T, GroupFailure> + Sync,
{
    let groups: Vec<ManifestGroup<'_>> = manifest.groups().collect();
    let total = groups.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    if let Some(callback) = progress_callback {
        callback.on_phase_start(phase, total);
    }

    let pool = build_pool(threads, phase)?;
    let completed = AtomicUsize::new(0);

    let results: Vec<Result<T, GroupFailure>> = pool.install(|| {
        groups
            .into_par_iter()
            .map(|group| {
                let result = task(group);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(callback) = progress_callback {
                    callback.on_progress(done, group.representative());
                }
                result
            })
            .collect()
    });

    if let Some(callback) = progress_callback {
        callback.on_phase_end(phase);
    }

    let mut outputs = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(failure) => {
                log::error!("{}", failure);
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(outputs)
    } else {
        Err(ActionError::GroupsFailed { failures, total })
    }
}
