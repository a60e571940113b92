//! Content hashing with a bounded memo cache.
//!
//! - Partial mode: first 1 MiB plus, for files larger than 2 MiB, the last 1 MiB.
//!   Files up to 2 MiB are hashed whole, so partial == full for them.
//! - Full mode: the whole file, read in 4 KiB chunks through a large BufReader.
//! - Digests are xxHash64 (seed 0), rendered as 16 hex digits.
//!
//! Notes:
//! - Entries are keyed by (absolute path, mode) and a hit never touches the filesystem.
//! - The cache is an LRU with fixed capacity. Nothing watches mtimes: the engine calls
//!   `invalidate` for every path it renames, copies into or deletes, so only changes
//!   made by other processes during a run can go unnoticed.

use lru::LruCache;
use std::fmt;
use std::fs::File;
use std::hash::Hasher;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;
use twox_hash::XxHash64;

use crate::errors::SyncError;

const MIB: u64 = 1024 * 1024;
/// Bytes hashed from each end of a file in partial mode.
pub const PARTIAL_WINDOW: u64 = MIB;
const CHUNK: usize = 4096;
const READ_BUFFER: usize = 1024 * 1024;

/// Which part of the file a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashMode {
    Partial,
    Full,
}

/// xxHash64 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub u64);

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Thread-safe, bounded memo of file digests.
pub struct HashCache {
    entries: Mutex<LruCache<(PathBuf, HashMode), Digest>>,
}

impl HashCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn key(path: &Path, mode: HashMode) -> (PathBuf, HashMode) {
        let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        (abs, mode)
    }

    /// Digest of `path` in the given mode, computing it on a miss.
    /// The lock is not held while reading the file, so two workers can hash in parallel.
    pub fn hash(&self, path: &Path, mode: HashMode) -> Result<Digest, SyncError> {
        let key = Self::key(path, mode);
        if let Ok(mut entries) = self.entries.lock()
            && let Some(d) = entries.get(&key)
        {
            return Ok(*d);
        }

        let digest = compute_digest(path, mode)?;
        trace!(path = %path.display(), ?mode, digest = %digest, "hashed");
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, digest);
        }
        Ok(digest)
    }

    /// Drop both cached digests for `path`.
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(&Self::key(path, HashMode::Partial));
            entries.pop(&Self::key(path, HashMode::Full));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn feed<R: Read>(reader: &mut R, hasher: &mut XxHash64, limit: Option<u64>) -> std::io::Result<()> {
    let mut buf = [0u8; CHUNK];
    let mut remaining = limit.unwrap_or(u64::MAX);
    while remaining > 0 {
        let want = remaining.min(CHUNK as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.write(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(())
}

/// Uncached digest computation.
pub fn compute_digest(path: &Path, mode: HashMode) -> Result<Digest, SyncError> {
    let file = File::open(path).map_err(SyncError::io("open for hashing", path))?;
    let len = file
        .metadata()
        .map_err(SyncError::io("stat for hashing", path))?
        .len();
    let mut reader = BufReader::with_capacity(READ_BUFFER, file);
    let mut hasher = XxHash64::default();
    let read_err = SyncError::io("read for hashing", path);

    let result = match mode {
        HashMode::Partial if len > 2 * PARTIAL_WINDOW => {
            feed(&mut reader, &mut hasher, Some(PARTIAL_WINDOW)).and_then(|_| {
                reader.seek(SeekFrom::End(-(PARTIAL_WINDOW as i64)))?;
                feed(&mut reader, &mut hasher, Some(PARTIAL_WINDOW))
            })
        }
        _ => feed(&mut reader, &mut hasher, None),
    };
    result.map_err(read_err)?;
    Ok(Digest(hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn small_files_hash_identically_in_both_modes() {
        let td = tempdir().unwrap();
        let p = td.path().join("a.jpg");
        fs::write(&p, patterned(10_000)).unwrap();
        let partial = compute_digest(&p, HashMode::Partial).unwrap();
        let full = compute_digest(&p, HashMode::Full).unwrap();
        assert_eq!(partial, full);
    }

    #[test]
    fn partial_ignores_the_middle_of_large_files() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.bin");
        let b = td.path().join("b.bin");
        let mut data = patterned((3 * MIB) as usize);
        fs::write(&a, &data).unwrap();
        data[(MIB + MIB / 2) as usize] ^= 0xff;
        fs::write(&b, &data).unwrap();

        assert_eq!(
            compute_digest(&a, HashMode::Partial).unwrap(),
            compute_digest(&b, HashMode::Partial).unwrap()
        );
        assert_ne!(
            compute_digest(&a, HashMode::Full).unwrap(),
            compute_digest(&b, HashMode::Full).unwrap()
        );
    }

    #[test]
    fn cache_hit_does_not_touch_the_filesystem() {
        let td = tempdir().unwrap();
        let p = td.path().join("a.jpg");
        fs::write(&p, b"X").unwrap();
        let cache = HashCache::new(8);
        let first = cache.hash(&p, HashMode::Full).unwrap();
        fs::remove_file(&p).unwrap();
        assert_eq!(cache.hash(&p, HashMode::Full).unwrap(), first);

        cache.invalidate(&p);
        assert!(matches!(
            cache.hash(&p, HashMode::Full),
            Err(SyncError::FileNotFound(_))
        ));
    }

    #[test]
    fn capacity_is_bounded() {
        let td = tempdir().unwrap();
        let cache = HashCache::new(2);
        for i in 0..5 {
            let p = td.path().join(format!("{i}.jpg"));
            fs::write(&p, [i as u8]).unwrap();
            cache.hash(&p, HashMode::Full).unwrap();
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn digest_renders_as_hex() {
        assert_eq!(Digest(0xab).to_string(), "00000000000000ab");
    }
}
