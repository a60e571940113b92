//! Trash-based deletion.
//!
//! Deleted files are renamed into `<trash root>/<NNNN>/<name>[_<i>]` where `NNNN` is
//! `floor(relocated / 1000)`, zero padded. The root and each shard are created lazily.
//!
//! Notes:
//! - Relocations are serialised by one mutex: picking a free name and renaming into it
//!   happen under the lock, so two workers never race for the same trash path.
//! - The shard counter resumes from what is already on disk the first time the trash
//!   is touched, so repeated runs keep filling shards up to 1000 entries.
//! - Renames only work within one filesystem; the default root sits on the source
//!   volume for that reason.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::drive::guess_drive_root;
use super::naming::collision_candidate;
use crate::config::Config;
use crate::errors::SyncError;
use crate::stats::{Counter, StatsRegistry};

pub const TRASH_DIR_NAME: &str = ".trash";
pub const SHARD_SIZE: u64 = 1000;
const MAX_TRASH_NAME_ATTEMPTS: u32 = 9000;

#[derive(Debug, Default)]
struct ShardState {
    seeded: bool,
    relocated: u64,
}

pub struct TrashManager {
    root: PathBuf,
    dry_run: bool,
    deletions_allowed: bool,
    stats: Arc<StatsRegistry>,
    state: Mutex<ShardState>,
}

impl TrashManager {
    pub fn new(root: PathBuf, stats: Arc<StatsRegistry>) -> Self {
        Self {
            root,
            dry_run: false,
            deletions_allowed: true,
            stats,
            state: Mutex::new(ShardState::default()),
        }
    }

    /// Trash rooted at the configured override, or `<drive root of source>/.trash`.
    pub fn from_config(cfg: &Config, stats: Arc<StatsRegistry>) -> Self {
        let root = cfg
            .trash_dir
            .clone()
            .unwrap_or_else(|| guess_drive_root(&cfg.source_dir).join(TRASH_DIR_NAME));
        Self {
            dry_run: cfg.dry_run,
            deletions_allowed: cfg.deletions_allowed(),
            ..Self::new(root, stats)
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shard directory the next relocation lands in.
    pub fn current_shard(&self) -> Result<PathBuf, SyncError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        self.seed(&mut state)?;
        Ok(self.shard_dir(state.relocated))
    }

    /// Move `path` into the trash and count it as a deletion.
    /// Returns true if the original path no longer exists afterwards.
    pub fn delete(&self, path: &Path) -> Result<bool, SyncError> {
        if !self.deletions_allowed {
            return Err(SyncError::Config(format!(
                "refusing to delete {}: deletions are disabled when hashing is skipped or in copy mode",
                path.display()
            )));
        }
        self.relocate(path, true)
    }

    /// Trash the source of a verified cross-filesystem move. Not counted as a deletion;
    /// the move itself is what gets recorded.
    pub fn discard_moved_source(&self, path: &Path) -> Result<bool, SyncError> {
        self.relocate(path, false)
    }

    /// Unlink without a trash copy. Only for files the engine judged disposable.
    pub fn delete_permanently(&self, path: &Path) -> Result<bool, SyncError> {
        if self.dry_run {
            info!(path = %path.display(), "dry-run: would delete junk file");
            return Ok(false);
        }
        fs::remove_file(path).map_err(SyncError::io("delete file", path))?;
        self.stats.record(Counter::FilesDeleted);
        debug!(path = %path.display(), "deleted permanently");
        Ok(fs::symlink_metadata(path).is_err())
    }

    fn shard_dir(&self, relocated: u64) -> PathBuf {
        self.root.join(format!("{:04}", relocated / SHARD_SIZE))
    }

    /// Seed the counter from the highest numeric shard already present.
    fn seed(&self, state: &mut ShardState) -> Result<(), SyncError> {
        if state.seeded {
            return Ok(());
        }
        state.seeded = true;
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SyncError::io("read trash root", &self.root)(e)),
        };
        let last = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse::<u64>().ok()))
            .max();
        if let Some(shard) = last {
            let dir = self.root.join(format!("{shard:04}"));
            let count = fs::read_dir(&dir)
                .map(|rd| rd.filter_map(Result::ok).count() as u64)
                .unwrap_or(0);
            state.relocated = shard * SHARD_SIZE + count.min(SHARD_SIZE);
            debug!(root = %self.root.display(), shard, count, "resuming trash shard");
        }
        Ok(())
    }

    fn free_name(shard: &Path, src: &Path) -> Result<PathBuf, SyncError> {
        let name = src.file_name().ok_or_else(|| SyncError::InvalidPath {
            path: src.to_path_buf(),
            reason: "path has no final component",
        })?;
        let first = shard.join(name);
        if fs::symlink_metadata(&first).is_err() {
            return Ok(first);
        }
        let mut last = first.clone();
        for i in 0..MAX_TRASH_NAME_ATTEMPTS {
            last = collision_candidate(&first, i);
            if fs::symlink_metadata(&last).is_err() {
                return Ok(last);
            }
        }
        Err(SyncError::ExhaustedAttempts {
            src: src.to_path_buf(),
            last,
            attempts: MAX_TRASH_NAME_ATTEMPTS,
        })
    }

    fn relocate(&self, path: &Path, record: bool) -> Result<bool, SyncError> {
        if self.dry_run {
            info!(path = %path.display(), trash = %self.root.display(), "dry-run: would move file to trash");
            return Ok(false);
        }

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        self.seed(&mut state)?;

        let shard = self.shard_dir(state.relocated);
        if !shard.is_dir() {
            if !self.root.exists() {
                info!(root = %self.root.display(), "creating trash directory");
            }
            fs::create_dir_all(&shard).map_err(SyncError::io("create trash shard", &shard))?;
        }

        let target = Self::free_name(&shard, path)?;
        fs::rename(path, &target).map_err(SyncError::io("move to trash", path))?;
        state.relocated += 1;
        drop(state);

        if record {
            self.stats.record(Counter::FilesDeleted);
        }
        debug!(src = %path.display(), trash = %target.display(), "moved to trash");

        let gone = fs::symlink_metadata(path).is_err();
        if !gone {
            warn!(path = %path.display(), "file still present after moving it to the trash");
        }
        Ok(gone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(root: &Path) -> (TrashManager, Arc<StatsRegistry>) {
        let stats = Arc::new(StatsRegistry::new());
        (TrashManager::new(root.join(TRASH_DIR_NAME), Arc::clone(&stats)), stats)
    }

    #[test]
    fn trash_root_is_created_lazily() {
        let td = tempdir().unwrap();
        let (trash, stats) = manager(td.path());
        assert!(!trash.root().exists());

        let f = td.path().join("a.jpg");
        fs::write(&f, b"X").unwrap();
        assert!(trash.delete(&f).unwrap());
        assert!(!f.exists());
        assert_eq!(fs::read(trash.root().join("0000").join("a.jpg")).unwrap(), b"X");
        assert_eq!(stats.get(Counter::FilesDeleted), 1);
    }

    #[test]
    fn same_name_is_suffixed_inside_a_shard() {
        let td = tempdir().unwrap();
        let (trash, _) = manager(td.path());
        for body in [b"1", b"2", b"3"] {
            let f = td.path().join("a.jpg");
            fs::write(&f, body).unwrap();
            trash.delete(&f).unwrap();
        }
        let shard = trash.root().join("0000");
        assert_eq!(fs::read(shard.join("a.jpg")).unwrap(), b"1");
        assert_eq!(fs::read(shard.join("a_0.jpg")).unwrap(), b"2");
        assert_eq!(fs::read(shard.join("a_1.jpg")).unwrap(), b"3");
    }

    #[test]
    fn counter_resumes_from_existing_shards() {
        let td = tempdir().unwrap();
        let root = td.path().join(TRASH_DIR_NAME);
        let shard = root.join("0003");
        fs::create_dir_all(&shard).unwrap();
        for i in 0..5 {
            fs::write(shard.join(format!("old{i}")), b"").unwrap();
        }
        let (trash, _) = manager(td.path());
        assert_eq!(trash.current_shard().unwrap(), shard);
    }

    #[test]
    fn moved_sources_are_not_counted() {
        let td = tempdir().unwrap();
        let (trash, stats) = manager(td.path());
        let f = td.path().join("v.mp4");
        fs::write(&f, b"v").unwrap();
        assert!(trash.discard_moved_source(&f).unwrap());
        assert_eq!(stats.get(Counter::FilesDeleted), 0);
    }

    #[test]
    fn permanent_delete_unlinks() {
        let td = tempdir().unwrap();
        let (trash, stats) = manager(td.path());
        let f = td.path().join(".DS_Store");
        fs::write(&f, b"").unwrap();
        assert!(trash.delete_permanently(&f).unwrap());
        assert!(!trash.root().exists());
        assert_eq!(stats.get(Counter::FilesDeleted), 1);
    }

    #[test]
    fn dry_run_changes_nothing() {
        let td = tempdir().unwrap();
        let (trash, stats) = manager(td.path());
        let trash = trash.with_dry_run(true);
        let f = td.path().join("a.jpg");
        fs::write(&f, b"X").unwrap();
        assert!(!trash.delete(&f).unwrap());
        assert!(f.exists());
        assert!(!trash.root().exists());
        assert_eq!(stats.get(Counter::FilesDeleted), 0);
    }

    #[test]
    fn missing_file_propagates() {
        let td = tempdir().unwrap();
        let (trash, _) = manager(td.path());
        let err = trash.delete(&td.path().join("ghost.jpg")).unwrap_err();
        assert!(matches!(err, SyncError::FileNotFound(_)));
    }
}
