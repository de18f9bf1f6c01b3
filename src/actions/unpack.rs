//! Unpack engine: recreate every duplicate recorded in a folder's manifest.
//!
//! Representatives stay where they are; each other path of a group receives
//! a fresh copy of its representative. The manifest is deleted only after
//! every group was restored, so a failed unpack can simply be run again.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytesize::ByteSize;

use super::{check_reserved_paths, copy_file, require_directory, run_groups, ActionError};
use crate::manifest::{manifest_path, Manifest};
use crate::progress::{ProgressCallback, PHASE_UNPACK};
use crate::scanner::path_utils::absolute_from;

/// Result of an unpack request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// The folder was restored.
    Unpacked(UnpackSummary),
    /// The folder holds no manifest; nothing was done.
    NotPacked,
}

/// Statistics of a completed unpack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Number of groups processed
    pub groups: usize,
    /// Number of files recreated from a representative
    pub files_restored: usize,
    /// Bytes written while restoring
    pub bytes_restored: u64,
}

impl fmt::Display for UnpackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unpacked {} group(s): {} file(s) restored, {} written",
            self.groups,
            self.files_restored,
            ByteSize::b(self.bytes_restored)
        )
    }
}

/// Reverse transform of a packed folder.
#[derive(Clone, Default)]
pub struct UnpackEngine {
    threads: usize,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for UnpackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpackEngine")
            .field("threads", &self.threads)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl UnpackEngine {
    /// Create an engine using all available hardware threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads (0 = auto).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Restore `folder` from its manifest.
    ///
    /// # Errors
    ///
    /// Returns an input error if `folder` is missing, a manifest error if
    /// `Manifest.json` is unreadable or invalid, and
    /// [`ActionError::GroupsFailed`] if any group could not be restored. In
    /// the latter case the manifest is left in place.
    pub fn unpack(&self, folder: &Path) -> Result<UnpackOutcome, ActionError> {
        require_directory(folder)?;

        let manifest = match Manifest::load_from_folder(folder)? {
            Some(manifest) => manifest,
            None => {
                log::info!("{} is not packed, nothing to do", folder.display());
                return Ok(UnpackOutcome::NotPacked);
            }
        };
        check_reserved_paths(&manifest)?;

        log::info!(
            "Unpacking {} ({} group(s), {} file(s) to restore)",
            folder.display(),
            manifest.len(),
            manifest.duplicate_count()
        );

        let restored = run_groups(
            &manifest,
            self.threads,
            PHASE_UNPACK,
            self.progress_callback.as_ref(),
            |group| {
                let representative = absolute_from(group.representative(), folder);
                let mut bytes = 0;
                for duplicate in group.duplicates() {
                    bytes += copy_file(
                        group.fingerprint,
                        &representative,
                        &absolute_from(duplicate, folder),
                    )?;
                }
                Ok((group.duplicates().len(), bytes))
            },
        )
        .inspect_err(|e| {
            if matches!(e, ActionError::GroupsFailed { .. }) {
                log::error!(
                    "Unpack of {} is incomplete; {} was kept so the unpack can be retried",
                    folder.display(),
                    manifest_path(folder).display()
                );
            }
        })?;

        Manifest::remove_from_folder(folder)?;

        let summary = UnpackSummary {
            groups: manifest.len(),
            files_restored: restored.iter().map(|(files, _)| files).sum(),
            bytes_restored: restored.iter().map(|(_, bytes)| bytes).sum(),
        };
        log::info!("{}", summary);
        Ok(UnpackOutcome::Unpacked(summary))
    }
}
