//! Pack engine: collapse duplicate files onto one representative.
//!
//! # Modes
//!
//! - **In place** (destination is the source): the manifest is written first,
//!   then every non-representative copy is deleted and directories left
//!   without files are removed.
//! - **Out of place**: the destination is cleared, each representative is
//!   copied over, and the manifest is written once every group succeeded.
//!   The source is never modified.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytesize::ByteSize;
use walkdir::WalkDir;

use super::{
    check_reserved_paths, copy_file, delete_file, require_directory, run_groups, verify_file,
    ActionError,
};
use crate::manifest::{manifest_exists, Manifest, ManifestBuilder};
use crate::progress::{ProgressCallback, PHASE_PACK};
use crate::scanner::path_utils::{absolute_from, is_within, same_location};
use crate::scanner::FileInventory;

/// Default number of polls while waiting for a cleared destination to vanish.
pub const DEFAULT_REMOVAL_POLL_ATTEMPTS: u32 = 500;

/// Default delay between two removal polls.
pub const DEFAULT_REMOVAL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for [`PackEngine`].
#[derive(Clone)]
pub struct PackConfig {
    /// Worker threads for group processing (0 = auto)
    pub threads: usize,
    /// Polls performed while waiting for the cleared destination to vanish
    pub removal_poll_attempts: u32,
    /// Delay between two polls
    pub removal_poll_interval: Duration,
    /// Optional progress callback, also handed to the manifest builder
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            removal_poll_attempts: DEFAULT_REMOVAL_POLL_ATTEMPTS,
            removal_poll_interval: DEFAULT_REMOVAL_POLL_INTERVAL,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackConfig")
            .field("threads", &self.threads)
            .field("removal_poll_attempts", &self.removal_poll_attempts)
            .field("removal_poll_interval", &self.removal_poll_interval)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Result of a pack request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackOutcome {
    /// The tree was packed.
    Packed(PackSummary),
    /// The folder already holds a manifest; nothing was done.
    AlreadyPacked,
}

/// Statistics of a completed pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    /// Number of distinct contents
    pub groups: usize,
    /// Number of files recorded in the manifest
    pub files: usize,
    /// Number of duplicate files not kept on disk
    pub duplicates_removed: usize,
    /// Bytes not stored thanks to deduplication
    pub bytes_saved: u64,
    /// Number of empty directories removed (in place only)
    pub directories_removed: usize,
    /// Whether the source itself was packed
    pub in_place: bool,
}

impl fmt::Display for PackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packed {} file(s) into {} group(s): {} duplicate(s) removed, {} saved",
            self.files,
            self.groups,
            self.duplicates_removed,
            ByteSize::b(self.bytes_saved)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    InPlace,
    Separate,
}

struct GroupStats {
    duplicates: usize,
    bytes_saved: u64,
}

/// Forward transform of a folder into its deduplicated form.
#[derive(Debug, Clone, Default)]
pub struct PackEngine {
    config: PackConfig,
}

impl PackEngine {
    /// Create an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: PackConfig) -> Self {
        Self { config }
    }

    /// Set the number of worker threads (0 = auto).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Fingerprint `inventory` and pack its base folder into `destination`.
    ///
    /// All checks that do not need fingerprints run first, and fingerprinting
    /// completes before anything is modified.
    ///
    /// # Errors
    ///
    /// Returns an input error for a missing source or overlapping folders, a
    /// build error if a file cannot be fingerprinted, and any error of
    /// [`PackEngine::pack`].
    pub fn pack_inventory(
        &self,
        inventory: &FileInventory,
        destination: &Path,
    ) -> Result<PackOutcome, ActionError> {
        let source = inventory.base_path();
        if self.preflight(source, destination)?.is_none() {
            return Ok(PackOutcome::AlreadyPacked);
        }

        let mut builder = ManifestBuilder::new().with_threads(self.config.threads);
        if let Some(ref callback) = self.config.progress_callback {
            builder = builder.with_progress_callback(Arc::clone(callback));
        }
        let manifest = builder.build(inventory)?;

        self.pack(&manifest, source, destination)
    }

    /// Pack `source` into `destination` following `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::GroupsFailed`] with every failing group, or the
    /// first precondition, clearing or manifest error.
    pub fn pack(
        &self,
        manifest: &Manifest,
        source: &Path,
        destination: &Path,
    ) -> Result<PackOutcome, ActionError> {
        let target = match self.preflight(source, destination)? {
            Some(target) => target,
            None => return Ok(PackOutcome::AlreadyPacked),
        };
        check_reserved_paths(manifest)?;

        let summary = match target {
            Target::InPlace => self.pack_in_place(manifest, source)?,
            Target::Separate => self.pack_separate(manifest, source, destination)?,
        };

        log::info!("{}", summary);
        Ok(PackOutcome::Packed(summary))
    }

    /// Validate the folders; `None` means the folder is already packed.
    fn preflight(&self, source: &Path, destination: &Path) -> Result<Option<Target>, ActionError> {
        require_directory(source)?;

        if same_location(source, destination) {
            if manifest_exists(destination) {
                log::info!(
                    "{} is already packed, nothing to do",
                    destination.display()
                );
                return Ok(None);
            }
            return Ok(Some(Target::InPlace));
        }

        if is_within(destination, source) || is_within(source, destination) {
            return Err(ActionError::OverlappingFolders {
                source_dir: source.to_path_buf(),
                destination: destination.to_path_buf(),
            });
        }

        Ok(Some(Target::Separate))
    }

    fn pack_in_place(&self, manifest: &Manifest, source: &Path) -> Result<PackSummary, ActionError> {
        log::info!(
            "Packing {} in place ({} group(s))",
            source.display(),
            manifest.len()
        );

        // Recorded before any deletion so unpack can always restore.
        manifest.save(source)?;

        let stats = run_groups(
            manifest,
            self.config.threads,
            PHASE_PACK,
            self.config.progress_callback.as_ref(),
            |group| {
                let representative = absolute_from(group.representative(), source);
                let size = verify_file(group.fingerprint, &representative)?;
                let mut deleted = 0;
                for duplicate in group.duplicates() {
                    let duplicate = absolute_from(duplicate, source);
                    // Another name for the representative holds no extra copy
                    if same_location(&representative, &duplicate) {
                        log::warn!(
                            "{} names the same file as {}, leaving it in place",
                            duplicate.display(),
                            representative.display()
                        );
                        continue;
                    }
                    delete_file(group.fingerprint, &duplicate)?;
                    deleted += 1;
                }
                Ok(GroupStats {
                    duplicates: deleted,
                    bytes_saved: size * deleted as u64,
                })
            },
        )
        .inspect_err(|e| {
            if matches!(e, ActionError::GroupsFailed { .. }) {
                log::error!(
                    "In-place pack of {} is incomplete; run unpack to restore removed files",
                    source.display()
                );
            }
        })?;

        let directories_removed = remove_orphan_directories(source)?;

        Ok(summarize(manifest, &stats, directories_removed, true))
    }

    fn pack_separate(
        &self,
        manifest: &Manifest,
        source: &Path,
        destination: &Path,
    ) -> Result<PackSummary, ActionError> {
        log::info!(
            "Packing {} into {} ({} group(s))",
            source.display(),
            destination.display(),
            manifest.len()
        );

        clear_destination(
            destination,
            self.config.removal_poll_attempts,
            self.config.removal_poll_interval,
        )?;
        fs::create_dir_all(destination).map_err(ActionError::io(destination))?;

        let stats = run_groups(
            manifest,
            self.config.threads,
            PHASE_PACK,
            self.config.progress_callback.as_ref(),
            |group| {
                let representative = group.representative();
                let size = copy_file(
                    group.fingerprint,
                    &absolute_from(representative, source),
                    &absolute_from(representative, destination),
                )?;
                Ok(GroupStats {
                    duplicates: group.duplicates().len(),
                    bytes_saved: size * group.duplicates().len() as u64,
                })
            },
        )?;

        if let Err(e) = manifest.save(destination) {
            log::error!(
                "{} holds a packed tree but its manifest could not be written; it cannot be unpacked: {}",
                destination.display(),
                e
            );
            return Err(e.into());
        }

        Ok(summarize(manifest, &stats, 0, false))
    }
}

fn summarize(
    manifest: &Manifest,
    stats: &[GroupStats],
    directories_removed: usize,
    in_place: bool,
) -> PackSummary {
    PackSummary {
        groups: manifest.len(),
        files: manifest.file_count(),
        duplicates_removed: stats.iter().map(|s| s.duplicates).sum(),
        bytes_saved: stats.iter().map(|s| s.bytes_saved).sum(),
        directories_removed,
        in_place,
    }
}

/// Delete `destination` entirely and wait until the removal is visible.
fn clear_destination(
    destination: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), ActionError> {
    let metadata = match fs::symlink_metadata(destination) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ActionError::io(destination)(e)),
    };

    log::info!("Clearing destination {}", destination.display());
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(destination)
    } else {
        fs::remove_file(destination)
    };
    removed.map_err(ActionError::io(destination))?;

    wait_for_removal(destination, attempts, interval)
}

/// Poll until `path` no longer exists, at most `attempts` times.
pub(crate) fn wait_for_removal(
    path: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), ActionError> {
    for attempt in 1..=attempts {
        if fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        log::trace!(
            "Waiting for {} to disappear (attempt {}/{})",
            path.display(),
            attempt,
            attempts
        );
        thread::sleep(interval);
    }

    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    Err(ActionError::RemovalTimeout {
        path: path.to_path_buf(),
        attempts,
    })
}

/// Remove every directory below `root` that holds no file at any depth.
///
/// Directories are visited deepest first so that emptied parents are removed
/// too. `root` itself is kept. Returns the number of directories removed.
pub(crate) fn remove_orphan_directories(root: &Path) -> Result<usize, ActionError> {
    let mut directories: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            ActionError::Io { path, source }
        })?;
        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        }
    }

    let mut removed = 0;
    for directory in directories {
        let is_empty = fs::read_dir(&directory)
            .map_err(ActionError::io(&directory))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&directory).map_err(ActionError::io(&directory))?;
            log::debug!("Removed empty directory {}", directory.display());
            removed += 1;
        }
    }

    Ok(removed)
}
