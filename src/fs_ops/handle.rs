//! Validated path value types.
//!
//! `FileHandle` and `DirHandle` wrap absolute paths checked at construction time, so
//! the rest of the engine never has to wonder whether a path is relative or which
//! kind of entry it names.
//!
//! Notes:
//! - Validation is a point-in-time check; files can still vanish later, and every
//!   consumer treats NotFound as a normal error.
//! - Cached attributes (size, mtime, hashes) live in the engine caches, keyed by path.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::SyncError;

/// Extension of metadata sidecars that travel with their media file.
pub const SIDECAR_EXTENSION: &str = "xmp";

/// Sidecar path for a media path: `IMG_1.jpg` -> `IMG_1.xmp`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension(SIDECAR_EXTENSION)
}

fn require_absolute(path: &Path) -> Result<(), SyncError> {
    if !path.is_absolute() {
        return Err(SyncError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path must be absolute",
        });
    }
    if path.file_name().is_none() {
        return Err(SyncError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path has no final component",
        });
    }
    Ok(())
}

/// An existing regular file addressed by an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    /// Validate that `path` is absolute and currently names a regular file.
    /// Symlinks are rejected; the engine never moves a link in place of its target.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        require_absolute(&path)?;
        let meta = fs::symlink_metadata(&path).map_err(SyncError::io("stat", &path))?;
        if !meta.file_type().is_file() {
            return Err(SyncError::InvalidPath {
                path,
                reason: "not a regular file",
            });
        }
        Ok(Self { path })
    }

    /// Like `new`, but resolves a relative path against the current directory first.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let p = path.as_ref();
        let abs = std::path::absolute(p).map_err(SyncError::io("resolve path", p))?;
        Self::new(abs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &OsStr {
        // Checked non-empty in `require_absolute`.
        self.path.file_name().unwrap_or_default()
    }

    pub fn sidecar(&self) -> PathBuf {
        sidecar_path(&self.path)
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for FileHandle {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// An existing directory addressed by an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirHandle {
    path: PathBuf,
}

impl DirHandle {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(SyncError::InvalidPath {
                path,
                reason: "path must be absolute",
            });
        }
        let meta = fs::metadata(&path).map_err(SyncError::io("stat", &path))?;
        if !meta.is_dir() {
            return Err(SyncError::InvalidPath {
                path,
                reason: "not a directory",
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination for a file name inside this directory (no existence check).
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl AsRef<Path> for DirHandle {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
