//! Manifest construction from a file inventory.
//!
//! Every file of the inventory is fingerprinted on a dedicated rayon pool,
//! then the `(fingerprint, relative path)` pairs are grouped by fingerprint in
//! discovery order. The first discovered path of each group becomes its
//! representative, so the same tree always keeps the same physical files.
//!
//! The build is all-or-nothing: if a single file cannot be fingerprinted, no
//! manifest is produced.
//!
//! # Example
//!
//! ```no_run
//! use packrat::manifest::ManifestBuilder;
//! use packrat::scanner::{FileInventory, MatcherConfig};
//! use std::path::Path;
//!
//! let inventory = FileInventory::from_directory(Path::new("assets"), &MatcherConfig::default())?;
//! let manifest = ManifestBuilder::new().with_threads(4).build(&inventory)?;
//! println!("{} groups, {} duplicates", manifest.len(), manifest.duplicate_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::Manifest;
use crate::pool::build_pool;
use crate::progress::{ProgressCallback, PHASE_FINGERPRINT};
use crate::scanner::path_utils::relative_to;
use crate::scanner::{FileInventory, HashError, Hasher};

/// Errors that can occur while building a manifest.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A file could not be fingerprinted.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// A path cannot be represented in the manifest.
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Builds a [`Manifest`] from a [`FileInventory`].
#[derive(Clone, Default)]
pub struct ManifestBuilder {
    hasher: Hasher,
    /// Worker threads for fingerprinting (0 = one per hardware thread).
    threads: usize,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ManifestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestBuilder")
            .field("hasher", &self.hasher)
            .field("threads", &self.threads)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ManifestBuilder {
    /// Create a builder using all available hardware threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of fingerprinting threads (0 = auto).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Use a specific hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Fingerprint every file of `inventory` and group the results.
    ///
    /// # Errors
    ///
    /// Fails with the first fingerprinting error encountered, or if a path
    /// cannot be expressed as UTF-8.
    pub fn build(&self, inventory: &FileInventory) -> Result<Manifest, BuildError> {
        let base = inventory.base_path();
        let files: Vec<(&PathBuf, String)> = inventory
            .files()
            .iter()
            .map(|file| {
                relative_to(file, base)
                    .map(|relative| (file, relative))
                    .ok_or_else(|| BuildError::NonUtf8Path(file.clone()))
            })
            .collect::<Result<_, _>>()?;

        if files.is_empty() {
            log::debug!("No files to fingerprint under {}", base.display());
            return Ok(Manifest::new());
        }

        log::info!("Fingerprinting {} file(s)", files.len());

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_FINGERPRINT, files.len());
        }

        let pool = build_pool(self.threads, PHASE_FINGERPRINT)?;
        let completed = AtomicUsize::new(0);

        let fingerprints = pool.install(|| {
            files
                .par_iter()
                .map(|(path, relative)| {
                    let fingerprint = self.hasher.fingerprint(path);
                    if let Err(ref e) = fingerprint {
                        log::warn!("Failed to fingerprint {}: {}", path.display(), e);
                    }
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(done, relative);
                    }
                    fingerprint
                })
                .collect::<Result<Vec<_>, HashError>>()
        });

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_FINGERPRINT);
        }

        let fingerprints = fingerprints?;

        let mut manifest = Manifest::new();
        for ((_, relative), fingerprint) in files.into_iter().zip(fingerprints) {
            manifest.insert(fingerprint, relative);
        }

        log::info!(
            "Manifest built: {} file(s) in {} group(s), {} duplicate(s)",
            manifest.file_count(),
            manifest.len(),
            manifest.duplicate_count()
        );

        Ok(manifest)
    }
}
