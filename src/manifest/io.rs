//! Reading and writing `Manifest.json`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Manifest, ManifestError};

/// File name of the manifest at the root of a packed folder.
pub const MANIFEST_FILE_NAME: &str = "Manifest.json";

/// Location of the manifest for `folder`.
#[must_use]
pub fn manifest_path(folder: &Path) -> PathBuf {
    folder.join(MANIFEST_FILE_NAME)
}

/// Check whether `folder` holds a manifest, i.e. is packed.
#[must_use]
pub fn manifest_exists(folder: &Path) -> bool {
    manifest_path(folder).is_file()
}

impl Manifest {
    /// Load and validate a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file cannot be read, or a parse or
    /// validation error.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_json(&bytes)?;
        log::debug!(
            "Loaded manifest {} ({} groups)",
            path.display(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Load the manifest of `folder`, or `None` if the folder is not packed.
    ///
    /// # Errors
    ///
    /// Same as [`Manifest::load`].
    pub fn load_from_folder(folder: &Path) -> Result<Option<Self>, ManifestError> {
        let path = manifest_path(folder);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Write the manifest into `folder`, replacing any existing one.
    ///
    /// The JSON is written to a temporary file in the same folder, flushed to
    /// disk, then renamed over `Manifest.json`, so readers never observe a
    /// partially written manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if any step fails; the temporary file is
    /// removed in that case.
    pub fn save(&self, folder: &Path) -> Result<PathBuf, ManifestError> {
        let json = self.to_json()?;
        let path = manifest_path(folder);
        let temp_path = folder.join(format!(
            ".{}.{}.tmp",
            MANIFEST_FILE_NAME,
            std::process::id()
        ));

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ManifestError::Io { path, source }
        };

        let write_result = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.sync_all()
            })
            .map_err(io_err(&temp_path))
            .and_then(|()| fs::rename(&temp_path, &path).map_err(io_err(&path)));

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        log::debug!("Wrote manifest {}", path.display());
        Ok(path)
    }

    /// Delete the manifest of `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file exists but cannot be removed.
    pub fn remove_from_folder(folder: &Path) -> Result<(), ManifestError> {
        let path = manifest_path(folder);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ManifestError::Io { path, source }),
        }
    }
}
