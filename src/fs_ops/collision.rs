//! Destination collision resolution.
//!
//! For a (source, desired destination) pair decide whether the transfer may proceed,
//! where to, or whether the source is a duplicate of what is already there.
//!
//! Resolution order for each candidate (`desired`, then `<stem>_0`, `<stem>_1`, ...):
//! 1. Candidate and its `.xmp` sidecar are both absent: accept it.
//! 2. `skip_collision`: record a skip and reject.
//! 3. Same size, same mtime (unless `skip_mtime_compare`), same partial hash, same full
//!    hash: the source is a duplicate. It is trashed unless duplicates are kept, we are
//!    copying, or hashing was skipped.
//! 4. Otherwise try the next candidate, up to `max_attempts`.
//!
//! A candidate that is the source itself is an invariant violation and fails loudly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

use super::handle::{FileHandle, sidecar_path};
use super::hash::{HashCache, HashMode};
use super::naming::collision_candidate;
use super::stat::{FileStat, FileStatCache};
use super::trash::TrashManager;
use crate::config::Config;
use crate::errors::SyncError;
use crate::stats::{Counter, StatsRegistry};

/// Outcome of resolving one (source, desired destination) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationDecision {
    /// Free path to transfer to: the desired one or a suffixed alternative.
    Accepted(PathBuf),
    /// Identical content already at a candidate; nothing to transfer.
    DuplicateHandled { removed_source: bool },
    /// Occupied destination under the skip-on-collision policy.
    Rejected,
    /// No free candidate within the attempt bound.
    ExhaustedAttempts { last: PathBuf },
}

/// Collision policy knobs, taken from `Config`.
#[derive(Debug, Clone, Copy)]
pub struct CollisionPolicy {
    pub skip_collision: bool,
    pub skip_mtime_compare: bool,
    pub skip_hash: bool,
    pub keep_duplicates: bool,
    pub copy_mode: bool,
    pub max_attempts: u32,
}

impl CollisionPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            skip_collision: cfg.skip_collision,
            skip_mtime_compare: cfg.skip_mtime_compare,
            skip_hash: cfg.skip_hash,
            keep_duplicates: cfg.keep_duplicates,
            copy_mode: cfg.copy_mode,
            max_attempts: cfg.max_collision_attempts,
        }
    }

    fn removes_duplicates(&self) -> bool {
        !(self.keep_duplicates || self.copy_mode || self.skip_hash)
    }
}

pub struct CollisionResolver {
    policy: CollisionPolicy,
    hashes: Arc<HashCache>,
    stats_cache: Arc<FileStatCache>,
    trash: Arc<TrashManager>,
    stats: Arc<StatsRegistry>,
}

enum Probe {
    Free,
    Duplicate,
    Differs,
}

impl CollisionResolver {
    pub fn new(
        policy: CollisionPolicy,
        hashes: Arc<HashCache>,
        stats_cache: Arc<FileStatCache>,
        trash: Arc<TrashManager>,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        Self {
            policy,
            hashes,
            stats_cache,
            trash,
            stats,
        }
    }

    pub fn resolve(&self, src: &FileHandle, desired: &Path) -> Result<DestinationDecision, SyncError> {
        let mut candidate = desired.to_path_buf();
        let mut i: u32 = 0;
        loop {
            match self.probe(src, &candidate)? {
                Probe::Free => {
                    if i > 0 {
                        debug!(src = %src.path().display(), dest = %candidate.display(), "destination occupied; using suffixed name");
                    }
                    return Ok(DestinationDecision::Accepted(candidate));
                }
                Probe::Duplicate => {
                    let removed_source = self.handle_duplicate(src, &candidate)?;
                    return Ok(DestinationDecision::DuplicateHandled { removed_source });
                }
                Probe::Differs if self.policy.skip_collision => {
                    info!(src = %src.path().display(), dest = %candidate.display(), "destination exists; skipping");
                    self.stats.record(Counter::FilesSkipped);
                    return Ok(DestinationDecision::Rejected);
                }
                Probe::Differs => {}
            }
            if i >= self.policy.max_attempts {
                return Ok(DestinationDecision::ExhaustedAttempts { last: candidate });
            }
            candidate = collision_candidate(desired, i);
            i += 1;
        }
    }

    fn probe(&self, src: &FileHandle, candidate: &Path) -> Result<Probe, SyncError> {
        let dest_present = fs::symlink_metadata(candidate).is_ok();
        if !dest_present && fs::symlink_metadata(sidecar_path(candidate)).is_err() {
            return Ok(Probe::Free);
        }
        // Only a sidecar occupies the name; there is nothing to compare against.
        if !dest_present || self.policy.skip_collision {
            return Ok(Probe::Differs);
        }
        if self.files_match(src.path(), candidate)? {
            Ok(Probe::Duplicate)
        } else {
            Ok(Probe::Differs)
        }
    }

    fn files_match(&self, src: &Path, dest: &Path) -> Result<bool, SyncError> {
        if self.stats_cache.same_file(src, dest)? {
            return Err(SyncError::SameFile(dest.to_path_buf()));
        }
        let a = self.stats_cache.stat(src)?;
        let b = self.stats_cache.stat(dest)?;
        if a.size != b.size {
            return Ok(false);
        }
        if !self.policy.skip_mtime_compare && mtime_secs(&a) != mtime_secs(&b) {
            return Ok(false);
        }
        if self.policy.skip_hash {
            return Ok(true);
        }
        if self.hashes.hash(src, HashMode::Partial)? != self.hashes.hash(dest, HashMode::Partial)? {
            return Ok(false);
        }
        Ok(self.hashes.hash(src, HashMode::Full)? == self.hashes.hash(dest, HashMode::Full)?)
    }

    fn handle_duplicate(&self, src: &FileHandle, existing: &Path) -> Result<bool, SyncError> {
        self.stats.record(Counter::DuplicateFile);
        if !self.policy.removes_duplicates() {
            info!(src = %src.path().display(), existing = %existing.display(), "duplicate; keeping source");
            return Ok(false);
        }
        info!(src = %src.path().display(), existing = %existing.display(), "duplicate; removing source");
        let removed = self.trash.delete(src.path())?;
        self.forget(src.path());

        let sidecar = src.sidecar();
        if fs::symlink_metadata(&sidecar).is_ok() {
            self.trash.delete(&sidecar)?;
            self.forget(&sidecar);
        }
        Ok(removed)
    }

    fn forget(&self, path: &Path) {
        self.hashes.invalidate(path);
        self.stats_cache.invalidate(path);
    }
}

/// Whole-second mtime. Copies made by external tools do not always keep sub-second precision.
fn mtime_secs(stat: &FileStat) -> u64 {
    stat.modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
