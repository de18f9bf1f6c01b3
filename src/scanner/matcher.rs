//! Include-pattern resolution using jwalk for traversal.
//!
//! # Overview
//!
//! A pattern is a `/`- or `\`-separated list of segments. All segments but the
//! last name directories; the last one is a file-name glob. Directory
//! segments are resolved left to right:
//!
//! - a literal segment descends into that directory;
//! - `**` switches to a recursive search from the current directory, and the
//!   file-name glob is matched against files at any depth below it.
//!
//! Without `**` only files directly inside the resolved directory match.
//! A `..` segment cancels the literal segment before it and may not climb
//! above the base directory.
//!
//! Results from all patterns are merged into one list in first-seen order.
//! Duplicates are detected by the file they resolve to, so a followed symlink
//! and its target, or two spellings of one directory, yield a single entry.
//! Traversal is sorted by file name so the order is stable between runs.
//!
//! # Example
//!
//! ```no_run
//! use packrat::scanner::{MatcherConfig, PathMatcher};
//! use std::path::Path;
//!
//! let matcher = PathMatcher::new(&["**/*.log", "docs/*.md"], MatcherConfig::default())?;
//! let files = matcher.resolve(Path::new("/var/project"))?;
//! # Ok::<(), packrat::scanner::ScanError>(())
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use jwalk::WalkDir;

use super::{MatcherConfig, ScanError};

/// Pattern selecting every file at any depth.
pub const ALL_FILES_PATTERN: &str = "**/*";

/// Segment that switches to recursive matching.
const RECURSIVE_SEGMENT: &str = "**";

/// Segment naming the parent directory.
const PARENT_SEGMENT: &str = "..";

/// Legacy spelling of "every file" that must also match extensionless names.
const LEGACY_ALL_FILES: &str = "*.*";

/// One parsed include pattern.
#[derive(Debug, Clone)]
struct IncludePattern {
    /// Literal directory segments before any `**`
    directories: Vec<String>,
    /// Whether a `**` segment was present
    recursive: bool,
    /// Glob applied to file names
    file_glob: GlobMatcher,
}

impl IncludePattern {
    fn parse(raw: &str) -> Result<Option<Self>, ScanError> {
        let segments: Vec<&str> = raw
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        let Some((file_segment, directory_segments)) = segments.split_last() else {
            log::warn!("Ignoring empty include pattern '{}'", raw);
            return Ok(None);
        };

        let mut directories = Vec::new();
        let mut recursive = false;
        for (idx, segment) in directory_segments.iter().enumerate() {
            if *segment == RECURSIVE_SEGMENT {
                recursive = true;
                if idx + 1 < directory_segments.len() {
                    log::debug!(
                        "Pattern '{}': segments after '**' are covered by the recursive search",
                        raw
                    );
                }
                break;
            }
            if *segment == PARENT_SEGMENT {
                if directories.pop().is_none() {
                    return Err(ScanError::PatternOutsideBase(raw.to_string()));
                }
                continue;
            }
            directories.push((*segment).to_string());
        }

        let glob_source = if *file_segment == LEGACY_ALL_FILES {
            "*"
        } else {
            file_segment
        };
        let file_glob = GlobBuilder::new(glob_source)
            .literal_separator(true)
            .build()
            .map_err(|source| ScanError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Some(Self {
            directories,
            recursive,
            file_glob,
        }))
    }
}

/// Resolves include patterns against a base directory.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<IncludePattern>,
    config: MatcherConfig,
}

impl PathMatcher {
    /// Compile a set of include patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if a file-name glob is malformed
    /// and [`ScanError::PatternOutsideBase`] if a pattern climbs above the base
    /// directory.
    pub fn new<S: AsRef<str>>(patterns: &[S], config: MatcherConfig) -> Result<Self, ScanError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if let Some(parsed) = IncludePattern::parse(pattern.as_ref())? {
                compiled.push(parsed);
            }
        }

        Ok(Self {
            patterns: compiled,
            config,
        })
    }

    /// Number of usable patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if there are no usable patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Resolve all patterns below `base` into absolute file paths.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Io`] if a directory cannot be read.
    pub fn resolve(&self, base: &Path) -> Result<Vec<PathBuf>, ScanError> {
        // Resolved file -> index of the name kept for it
        let mut seen: HashMap<PathBuf, usize> = HashMap::new();
        let mut files: Vec<PathBuf> = Vec::new();

        for pattern in &self.patterns {
            let directory = pattern
                .directories
                .iter()
                .fold(base.to_path_buf(), |dir, segment| dir.join(segment));

            if !directory.is_dir() {
                log::debug!("No directory at {}, pattern matches nothing", directory.display());
                continue;
            }

            for path in self.enumerate(&directory, pattern.recursive, &pattern.file_glob)? {
                let identity = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                match seen.entry(identity) {
                    Entry::Vacant(slot) => {
                        slot.insert(files.len());
                        files.push(path);
                    }
                    Entry::Occupied(slot) => {
                        let kept = &mut files[*slot.get()];
                        if *kept == path {
                            continue;
                        }
                        // Prefer the real name over a symlink to it
                        if is_symlink(kept) && !is_symlink(&path) {
                            log::debug!(
                                "{} is an alias of {}, keeping the latter",
                                kept.display(),
                                path.display()
                            );
                            *kept = path;
                        } else {
                            log::debug!(
                                "{} is an alias of {}, skipping it",
                                path.display(),
                                kept.display()
                            );
                        }
                    }
                }
            }
        }

        Ok(files)
    }

    /// List files below `directory` whose name matches `glob`.
    fn enumerate(
        &self,
        directory: &Path,
        recursive: bool,
        glob: &GlobMatcher,
    ) -> Result<Vec<PathBuf>, ScanError> {
        let walk_dir = WalkDir::new(directory)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false)
            .sort(true)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 });

        let mut matched = Vec::new();
        for entry_result in walk_dir {
            let entry = entry_result.map_err(|e| Self::handle_jwalk_error(directory, e))?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }

            let path = entry.path();

            if file_type.is_symlink() {
                if !self.config.follow_symlinks {
                    log::trace!("Skipping symlink: {}", path.display());
                    continue;
                }
                match std::fs::metadata(&path) {
                    Ok(metadata) if metadata.is_file() => {}
                    _ => continue,
                }
            } else if !file_type.is_file() {
                log::trace!("Skipping special file: {}", path.display());
                continue;
            }

            if glob.is_match(entry.file_name()) {
                matched.push(path);
            }
        }

        Ok(matched)
    }

    fn handle_jwalk_error(directory: &Path, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| directory.to_path_buf(), Path::to_path_buf);
        log::warn!("Walker error for {}: {}", path.display(), error);
        ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        }
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
