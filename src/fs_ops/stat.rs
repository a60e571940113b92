//! Memoized stat lookups.
//!
//! Holds size, mtime and identity per path in a bounded LRU so collision checks and
//! classification do not re-stat the same file over and over. The engine invalidates
//! a path whenever it mutates it.

use lru::LruCache;
use std::fs::{self, Metadata};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::errors::SyncError;
use crate::platform::{FileIdentity, file_identity};

/// The subset of metadata the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: SystemTime,
    /// None where the platform offers no stable identity.
    pub identity: Option<FileIdentity>,
}

impl FileStat {
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            identity: file_identity(meta),
        }
    }
}

pub struct FileStatCache {
    entries: Mutex<LruCache<PathBuf, FileStat>>,
}

impl FileStatCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cached stat of `path` (following symlinks).
    pub fn stat(&self, path: &Path) -> Result<FileStat, SyncError> {
        if let Ok(mut entries) = self.entries.lock()
            && let Some(s) = entries.get(path)
        {
            return Ok(*s);
        }
        let meta = fs::metadata(path).map_err(SyncError::io("stat", path))?;
        let stat = FileStat::from_metadata(&meta);
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(path.to_path_buf(), stat);
        }
        Ok(stat)
    }

    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(path);
        }
    }

    /// Device id of the nearest existing ancestor of `path` (or `path` itself).
    /// Not cached: destinations usually do not exist yet and the walk is short.
    pub fn filesystem_id(&self, path: &Path) -> Result<Option<u64>, SyncError> {
        let mut cur = Some(path);
        while let Some(p) = cur {
            match fs::metadata(p) {
                Ok(meta) => return Ok(file_identity(&meta).map(|id| id.device)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => cur = p.parent(),
                Err(e) => return Err(SyncError::io("stat", p)(e)),
            }
        }
        Err(SyncError::FileNotFound(path.to_path_buf()))
    }

    /// Whether two paths name the same underlying file. Both must exist.
    pub fn same_file(&self, a: &Path, b: &Path) -> Result<bool, SyncError> {
        let ma = fs::metadata(a).map_err(SyncError::io("stat", a))?;
        let mb = fs::metadata(b).map_err(SyncError::io("stat", b))?;
        match (file_identity(&ma), file_identity(&mb)) {
            (Some(x), Some(y)) => Ok(x == y),
            _ => {
                let ca = dunce::canonicalize(a).map_err(SyncError::io("canonicalize", a))?;
                let cb = dunce::canonicalize(b).map_err(SyncError::io("canonicalize", b))?;
                Ok(ca == cb)
            }
        }
    }
}
