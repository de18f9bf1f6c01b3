//! Scanner module for file discovery and content fingerprinting.
//!
//! This module provides functionality for:
//! - Resolving include patterns (with `**` recursion) into file lists
//! - Content fingerprinting with BLAKE3
//! - Relative/absolute path conversion and path comparison
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`matcher`]: Include-pattern resolution and directory traversal
//! - [`hasher`]: BLAKE3 file fingerprinting (streaming)
//! - [`path_utils`]: Path conversion helpers used by the manifest and engines
//!
//! # Example
//!
//! ```no_run
//! use packrat::scanner::{FileInventory, MatcherConfig};
//! use std::path::Path;
//!
//! let inventory = FileInventory::from_directory(Path::new("."), &MatcherConfig::default())?;
//! for file in inventory.files() {
//!     println!("{}", file.display());
//! }
//! # Ok::<(), packrat::scanner::ScanError>(())
//! ```

pub mod hasher;
pub mod matcher;
pub mod path_utils;

use std::fs;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{fingerprint_bytes, Fingerprint, Hasher};
pub use matcher::{PathMatcher, ALL_FILES_PATTERN};

/// Configuration for pattern resolution.
#[derive(Debug, Clone, Default)]
pub struct MatcherConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,
}

/// The set of files a pack operation works on.
///
/// Holds the base directory together with a flat, duplicate-free list of
/// absolute file paths below it, in discovery order.
#[derive(Debug, Clone)]
pub struct FileInventory {
    base_path: PathBuf,
    files: Vec<PathBuf>,
}

impl FileInventory {
    /// Create an inventory from an already resolved file list.
    #[must_use]
    pub fn new(base_path: PathBuf, files: Vec<PathBuf>) -> Self {
        Self { base_path, files }
    }

    /// Inventory of every file below `directory`, at any depth.
    pub fn from_directory(directory: &Path, config: &MatcherConfig) -> Result<Self, ScanError> {
        Self::from_patterns(directory, &[ALL_FILES_PATTERN], config)
    }

    /// Inventory of the files below `directory` matching any of `patterns`.
    pub fn from_patterns<S: AsRef<str>>(
        directory: &Path,
        patterns: &[S],
        config: &MatcherConfig,
    ) -> Result<Self, ScanError> {
        if !directory.exists() {
            return Err(ScanError::NotFound(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(ScanError::NotADirectory(directory.to_path_buf()));
        }

        let matcher = PathMatcher::new(patterns, config.clone())?;
        let files = matcher.resolve(directory)?;
        log::debug!(
            "Inventory of {}: {} file(s) from {} pattern(s)",
            directory.display(),
            files.len(),
            patterns.len()
        );

        Ok(Self::new(directory.to_path_buf(), files))
    }

    /// Inventory described by a pack-list file.
    ///
    /// Each non-empty line that does not start with `#` is an include pattern,
    /// resolved relative to the directory containing the pack list.
    pub fn from_pack_file(pack_file: &Path, config: &MatcherConfig) -> Result<Self, ScanError> {
        let content = fs::read_to_string(pack_file).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(pack_file.to_path_buf()),
            _ => ScanError::Io {
                path: pack_file.to_path_buf(),
                source: e,
            },
        })?;

        let base = pack_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let patterns = parse_pack_list(&content);
        log::debug!(
            "Pack list {} holds {} pattern(s)",
            pack_file.display(),
            patterns.len()
        );

        Self::from_patterns(base, &patterns, config)
    }

    /// Base directory the file list was resolved against.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute paths of the matched files.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of files in this inventory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this inventory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Extract include patterns from pack-list text.
#[must_use]
pub fn parse_pack_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Errors that can occur while resolving files.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An include pattern could not be compiled.
    #[error("Invalid include pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// The underlying glob error
        #[source]
        source: globset::Error,
    },

    /// An include pattern climbs above the directory it is resolved against.
    #[error("Include pattern '{0}' leaves the base folder")]
    PatternOutsideBase(String),

    /// An I/O error occurred while accessing a file or directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file fingerprinting.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while fingerprinting `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
