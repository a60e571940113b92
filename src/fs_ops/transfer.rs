//! Checksum-verified move and copy.
//!
//! Move:
//! - Same filesystem (device of the nearest existing ancestor): atomic rename, no hashing.
//!   A rename that still reports EXDEV falls back to the copy path.
//! - Cross filesystem: verified copy, then the source goes to the trash.
//!
//! Copy (always verified):
//! - free space check, then full hash of the source taken before the copy starts;
//! - copy primitive with a size-scaled timeout, retried on transient failures;
//! - destination re-hashed; a mismatch quarantines it as `<stem>-corrupt<ext>` and fails
//!   the file. The source is never touched on failure.
//!
//! The caller guarantees the destination was free when resolved. If another worker took
//! it since, the transfer fails with `DestinationExists` rather than overwriting.
//! An `.xmp` sidecar follows the primary file on a best-effort basis.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::atomic::try_atomic_move;
use super::copier::{CopyPrimitive, copy_timeout};
use super::handle::{FileHandle, sidecar_path};
use super::hash::{HashCache, HashMode};
use super::naming::corrupt_candidate;
use super::stat::FileStatCache;
use super::trash::TrashManager;
use super::util::is_cross_device;
use crate::config::Config;
use crate::errors::SyncError;
use crate::platform::available_space;
use crate::stats::{Counter, StatsRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Move,
    Copy,
}

impl Op {
    fn verb(self) -> &'static str {
        match self {
            Op::Move => "move",
            Op::Copy => "copy",
        }
    }
}

pub struct TransferExecutor {
    copier: Arc<dyn CopyPrimitive>,
    hashes: Arc<HashCache>,
    stat_cache: Arc<FileStatCache>,
    trash: Arc<TrashManager>,
    stats: Arc<StatsRegistry>,
    dry_run: bool,
    copy_retries: u32,
    retry_delay: Duration,
}

impl TransferExecutor {
    pub fn new(
        cfg: &Config,
        copier: Arc<dyn CopyPrimitive>,
        hashes: Arc<HashCache>,
        stat_cache: Arc<FileStatCache>,
        trash: Arc<TrashManager>,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        Self {
            copier,
            hashes,
            stat_cache,
            trash,
            stats,
            dry_run: cfg.dry_run,
            copy_retries: cfg.copy_retries,
            retry_delay: cfg.retry_delay,
        }
    }

    /// Move `src` to `dest`. Returns the final destination path.
    pub fn move_file(&self, src: &FileHandle, dest: &Path) -> Result<PathBuf, SyncError> {
        self.run(src, dest, Op::Move)
    }

    /// Copy `src` to `dest`, leaving the source in place.
    pub fn copy_file(&self, src: &FileHandle, dest: &Path) -> Result<PathBuf, SyncError> {
        self.run(src, dest, Op::Copy)
    }

    /// Move by verified copy plus trashing the source, whatever the filesystems.
    /// This is what a cross-filesystem move does.
    pub fn move_via_copy(&self, src: &FileHandle, dest: &Path) -> Result<PathBuf, SyncError> {
        self.precheck(dest)?;
        self.ensure_parent(dest)?;
        if self.dry_run {
            return self.dry_run_transfer(src, dest, Op::Move);
        }
        self.move_across(src.path(), dest)?;
        self.stats.record(Counter::FilesMoved);
        self.carry_sidecar(src, dest, Op::Move);
        Ok(dest.to_path_buf())
    }

    fn run(&self, src: &FileHandle, dest: &Path, op: Op) -> Result<PathBuf, SyncError> {
        self.precheck(dest)?;
        self.ensure_parent(dest)?;
        if self.dry_run {
            return self.dry_run_transfer(src, dest, op);
        }
        self.transfer(src.path(), dest, op)?;
        self.stats.record(match op {
            Op::Move => Counter::FilesMoved,
            Op::Copy => Counter::FilesCopied,
        });
        info!(src = %src.path().display(), dest = %dest.display(), op = op.verb(), "transferred");
        self.carry_sidecar(src, dest, op);
        Ok(dest.to_path_buf())
    }

    fn dry_run_transfer(&self, src: &FileHandle, dest: &Path, op: Op) -> Result<PathBuf, SyncError> {
        info!(src = %src.path().display(), dest = %dest.display(), "dry-run: would {} file", op.verb());
        self.stats.record(match op {
            Op::Move => Counter::FilesMoved,
            Op::Copy => Counter::FilesCopied,
        });
        Ok(dest.to_path_buf())
    }

    fn precheck(&self, dest: &Path) -> Result<(), SyncError> {
        if fs::symlink_metadata(dest).is_ok() {
            return Err(SyncError::DestinationExists(dest.to_path_buf()));
        }
        Ok(())
    }

    /// Create missing destination directories top-down, counting only the levels this
    /// call created. A level another worker created first is not counted again.
    fn ensure_parent(&self, dest: &Path) -> Result<(), SyncError> {
        let Some(parent) = dest.parent() else {
            return Ok(());
        };
        let missing: Vec<&Path> = parent
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        if self.dry_run {
            debug!(dir = %parent.display(), "dry-run: would create directory");
            return Ok(());
        }
        let mut created = 0;
        for dir in missing.into_iter().rev() {
            match fs::create_dir(dir) {
                Ok(()) => created += 1,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                Err(e) => return Err(SyncError::io("create directory", dir)(e)),
            }
        }
        if created > 0 {
            self.stats.add(Counter::DirectoriesCreated, created);
            debug!(dir = %parent.display(), created, "created destination directory");
        }
        Ok(())
    }

    fn transfer(&self, src: &Path, dest: &Path, op: Op) -> Result<(), SyncError> {
        let result = match op {
            Op::Copy => self.verified_copy(src, dest),
            Op::Move if self.same_filesystem(src, dest)? => self.rename(src, dest),
            Op::Move => self.move_across(src, dest),
        };
        self.forget(src);
        self.forget(dest);
        result
    }

    fn same_filesystem(&self, src: &Path, dest: &Path) -> Result<bool, SyncError> {
        let a = self.stat_cache.filesystem_id(src)?;
        let b = self.stat_cache.filesystem_id(dest)?;
        // Without device ids, try the rename and let EXDEV decide.
        Ok(match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        })
    }

    fn rename(&self, src: &Path, dest: &Path) -> Result<(), SyncError> {
        match try_atomic_move(src, dest) {
            Ok(()) => {
                debug!(src = %src.display(), dest = %dest.display(), "renamed");
                Ok(())
            }
            Err(e) if is_cross_device(&e) => {
                debug!(src = %src.display(), dest = %dest.display(), "rename crossed devices; copying instead");
                self.move_across(src, dest)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(SyncError::DestinationExists(dest.to_path_buf()))
            }
            Err(e) => Err(SyncError::io("rename", src)(e)),
        }
    }

    fn move_across(&self, src: &Path, dest: &Path) -> Result<(), SyncError> {
        self.verified_copy(src, dest)?;
        let gone = self.trash.discard_moved_source(src)?;
        self.forget(src);
        if !gone {
            warn!(src = %src.display(), "source still present after verified copy");
        }
        Ok(())
    }

    fn verified_copy(&self, src: &Path, dest: &Path) -> Result<(), SyncError> {
        let size = fs::metadata(src).map_err(SyncError::io("stat source", src))?.len();
        self.check_space(dest, size)?;

        let expected = self.hashes.hash(src, HashMode::Full)?;
        let timeout = copy_timeout(size);
        let attempts = self.copy_retries.saturating_add(1);

        let mut attempt = 1;
        loop {
            match self.copy_once(src, dest, timeout) {
                Ok(()) => break,
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        src = %src.display(),
                        dest = %dest.display(),
                        tool = self.copier.name(),
                        attempt,
                        attempts,
                        kind = e.kind(),
                        error = %e,
                        "copy failed; retrying"
                    );
                    thread::sleep(self.retry_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.hashes.invalidate(dest);
        let actual = self.hashes.hash(dest, HashMode::Full)?;
        if actual == expected {
            debug!(src = %src.display(), dest = %dest.display(), digest = %actual, "copy verified");
            return Ok(());
        }

        let quarantined = corrupt_candidate(dest, |p| fs::symlink_metadata(p).is_ok());
        fs::rename(dest, &quarantined).map_err(SyncError::io("quarantine corrupt copy", dest))?;
        self.forget(dest);
        error!(
            src = %src.display(),
            dest = %dest.display(),
            quarantined = %quarantined.display(),
            expected = %expected,
            actual = %actual,
            "checksum mismatch after copy"
        );
        Err(SyncError::ChecksumMismatch {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            quarantined,
        })
    }

    fn copy_once(&self, src: &Path, dest: &Path, timeout: Duration) -> Result<(), SyncError> {
        self.copier.copy(src, dest, timeout)?;
        // Tools have been seen to report success without producing the file.
        if fs::symlink_metadata(dest).is_err() {
            return Err(SyncError::FileNotFound(dest.to_path_buf()));
        }
        Ok(())
    }

    fn check_space(&self, dest: &Path, required: u64) -> Result<(), SyncError> {
        let dir = dest.parent().unwrap_or(dest);
        match available_space(dir) {
            Ok(available) if available < required => Err(SyncError::InsufficientSpace {
                required,
                available,
                dest: dest.to_path_buf(),
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "free space unknown; copying anyway");
                Ok(())
            }
        }
    }

    /// Take the `.xmp` sidecar along. Failures are logged, never propagated.
    fn carry_sidecar(&self, src: &FileHandle, dest: &Path, op: Op) {
        let from = src.sidecar();
        if fs::symlink_metadata(&from).is_err() {
            return;
        }
        let to = sidecar_path(dest);
        if fs::symlink_metadata(&to).is_ok() {
            warn!(sidecar = %from.display(), dest = %to.display(), "sidecar destination exists; leaving sidecar behind");
            return;
        }
        match self.transfer(&from, &to, op) {
            Ok(()) => debug!(sidecar = %from.display(), dest = %to.display(), "sidecar transferred"),
            Err(e) => warn!(
                sidecar = %from.display(),
                dest = %to.display(),
                kind = e.kind(),
                error = %e,
                "sidecar transfer failed"
            ),
        }
    }

    fn forget(&self, path: &Path) {
        self.hashes.invalidate(path);
        self.stat_cache.invalidate(path);
    }
}
