//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing content
//! fingerprints of files. Files are streamed through the digest in fixed-size
//! chunks, so memory use does not depend on file size.
//!
//! Two files with identical bytes always produce the same fingerprint; the
//! manifest relies on this as an exact-equality test.
//!
//! # Example
//!
//! ```no_run
//! use packrat::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let fingerprint = hasher.fingerprint(Path::new("photo.jpg"))?;
//! println!("{fingerprint}");
//! # Ok::<(), packrat::scanner::HashError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::HashError;

/// Hex-encoded BLAKE3 digest of a file's full content.
pub type Fingerprint = String;

/// Read buffer size for streaming (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 content hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
        }
    }

    /// Create a hasher with a custom read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Compute the full-content digest of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read to the end.
    pub fn full_hash(&self, path: &Path) -> Result<blake3::Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(hasher.finalize())
    }

    /// Compute the hex fingerprint of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read to the end.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let hash = self.full_hash(path)?;
        log::trace!("Fingerprinted {}", path.display());
        Ok(hash.to_hex().to_string())
    }
}

/// Fingerprint of an in-memory byte slice, identical to hashing a file with
/// the same content.
#[must_use]
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    blake3::hash(data).to_hex().to_string()
}
