//! Path conversion and comparison utilities.
//!
//! Manifest entries are stored relative to the packed folder with `/` as the
//! separator, so a manifest written on one platform resolves on another.
//! [`relative_to`] and [`absolute_from`] convert between the two forms.
//!
//! Location checks ([`same_location`], [`is_within`]) resolve symlinks where
//! the path exists and compare NFC-normalized forms, since macOS hands out
//! NFD file names while users type NFC:
//!
//! - NFC: `café` - 'é' is U+00E9 (single code point)
//! - NFD: `café` - 'e' U+0065 + combining acute accent U+0301
//!
//! # Example
//!
//! ```
//! use packrat::scanner::path_utils::{absolute_from, relative_to};
//! use std::path::Path;
//!
//! let base = Path::new("/data/assets");
//! let rel = relative_to(&base.join("img").join("logo.png"), base);
//! assert_eq!(rel.as_deref(), Some("img/logo.png"));
//! assert_eq!(absolute_from("img/logo.png", base), base.join("img").join("logo.png"));
//! ```

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Express `path` relative to `base` in manifest form.
///
/// The base prefix is stripped component-wise, so `/data/ab` is not treated as
/// being inside `/data/a`. A path outside `base`, including one that climbs
/// out through `..`, is returned in its absolute form with `..` resolved.
/// Returns `None` when the path is not valid UTF-8.
#[must_use]
pub fn relative_to(path: &Path, base: &Path) -> Option<String> {
    let outside = || lexical_absolute(path).to_str().map(str::to_string);
    let Ok(relative) = path.strip_prefix(base) else {
        return outside();
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => return outside(),
            other => parts.push(other.as_os_str().to_str()?),
        }
    }
    Some(parts.join("/"))
}

/// Check whether a manifest path climbs to a parent directory.
#[must_use]
pub fn has_parent_segment(relative: &str) -> bool {
    relative.split(['/', '\\']).any(|segment| segment == "..")
}

/// Resolve a manifest path against `base`.
///
/// Both `/` and `\` are accepted as separators. An absolute entry (a file
/// that was outside the base when the manifest was built) is returned as is.
#[must_use]
pub fn absolute_from(relative: &str, base: &Path) -> PathBuf {
    if Path::new(relative).is_absolute() {
        return PathBuf::from(relative);
    }

    let mut path = base.to_path_buf();
    for segment in relative.split(['/', '\\']).filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Absolute form of `path` with `.` and `..` removed, without touching the
/// filesystem.
#[must_use]
pub fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Best-effort canonical form of a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized (resolving symlinks) and
/// the remaining components are appended lexically.
#[must_use]
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = lexical_absolute(path);
    let mut existing = absolute.as_path();
    let mut tail: Vec<OsString> = Vec::new();

    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

/// Check whether two paths name the same location.
#[must_use]
pub fn same_location(a: &Path, b: &Path) -> bool {
    let a = resolve_path(a);
    let b = resolve_path(b);
    a == b || paths_equal_normalized(&a, &b)
}

/// Check whether `inner` is `outer` or lies below it.
#[must_use]
pub fn is_within(inner: &Path, outer: &Path) -> bool {
    let inner = resolve_path(inner);
    let outer = resolve_path(outer);
    if inner.starts_with(&outer) {
        return true;
    }
    match (inner.to_str(), outer.to_str()) {
        (Some(i), Some(o)) => {
            Path::new(&normalize_path_str(i)).starts_with(Path::new(&normalize_path_str(o)))
        }
        _ => false,
    }
}

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Check if two path strings are equal after NFC normalization.
#[must_use]
pub fn paths_equal(a: &str, b: &str) -> bool {
    normalize_path_str(a) == normalize_path_str(b)
}

/// Check if two [`Path`]s are equal after NFC normalization.
///
/// Returns `false` if either path contains invalid UTF-8.
#[must_use]
pub fn paths_equal_normalized(a: &Path, b: &Path) -> bool {
    match (a.to_str(), b.to_str()) {
        (Some(a_str), Some(b_str)) => paths_equal(a_str, b_str),
        _ => false,
    }
}
