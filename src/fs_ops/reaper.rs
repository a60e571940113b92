//! Bottom-up removal of directories emptied by migration.
//!
//! A directory goes only when every entry is either a subdirectory that was itself just
//! removed or a junk file. The check completes before anything is deleted: one
//! non-junk file leaves the directory (and all its junk) untouched.
//!
//! Never removed: protected roots (source, target, trash), `.trash` trees, hidden
//! subdirectories and anything reached through a symlink.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::junk::is_junk;
use super::trash::{TRASH_DIR_NAME, TrashManager};
use crate::errors::SyncError;
use crate::stats::{Counter, StatsRegistry};

/// Directories removed and kept during one reaping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    pub removed: u64,
    pub kept: u64,
}

pub struct DirectoryReaper {
    trash: Arc<TrashManager>,
    stats: Arc<StatsRegistry>,
    dry_run: bool,
    protected: Vec<PathBuf>,
}

impl DirectoryReaper {
    pub fn new(trash: Arc<TrashManager>, stats: Arc<StatsRegistry>, dry_run: bool) -> Self {
        let protected = vec![trash.root().to_path_buf()];
        Self {
            trash,
            stats,
            dry_run,
            protected,
        }
    }

    /// Never remove `dir`, even when it ends up empty.
    pub fn protect(mut self, dir: impl Into<PathBuf>) -> Self {
        self.protected.push(dir.into());
        self
    }

    /// Remove `dir` if it holds nothing but junk and removable subdirectories.
    /// Returns true when the directory is gone (or would be, in dry run).
    pub fn reap_if_empty(&self, dir: &Path) -> Result<bool, SyncError> {
        let mut summary = ReapSummary::default();
        self.reap(dir, &mut summary)
    }

    /// Reap every visible subdirectory of `root`, deepest first. `root` itself stays.
    pub fn reap_tree(&self, root: &Path) -> Result<ReapSummary, SyncError> {
        let mut summary = ReapSummary::default();
        for sub in self.subdirectories(root)? {
            self.reap(&sub, &mut summary)?;
        }
        info!(root = %root.display(), removed = summary.removed, kept = summary.kept, "cleanup finished");
        Ok(summary)
    }

    fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir).map_err(SyncError::io("read directory", dir))? {
            let entry = entry.map_err(SyncError::io("read directory", dir))?;
            let ft = entry.file_type().map_err(SyncError::io("stat", &entry.path()))?;
            if ft.is_dir() && !is_hidden(&entry.path()) {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    fn is_protected(&self, dir: &Path) -> bool {
        dir.file_name().is_some_and(|n| n == TRASH_DIR_NAME)
            || self.protected.iter().any(|p| p == dir)
    }

    fn reap(&self, dir: &Path, summary: &mut ReapSummary) -> Result<bool, SyncError> {
        if fs::symlink_metadata(dir).is_err() {
            return Ok(true);
        }

        let entries = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(dir = %dir.display(), "permission denied; leaving directory");
                summary.kept += 1;
                return Ok(false);
            }
            Err(e) => return Err(SyncError::io("read directory", dir)(e)),
        };

        let mut junk = Vec::new();
        let mut removable = !self.is_protected(dir);
        for entry in entries {
            let entry = entry.map_err(SyncError::io("read directory", dir))?;
            let path = entry.path();
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                // Vanished while we looked.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SyncError::io("stat", &path)(e)),
            };
            let ft = meta.file_type();
            if ft.is_dir() {
                if is_hidden(&path) || self.is_protected(&path) {
                    removable = false;
                } else if !self.reap(&path, summary)? {
                    removable = false;
                }
            } else if ft.is_file() && is_junk(&path, meta.len()) {
                junk.push(path);
            } else {
                debug!(dir = %dir.display(), entry = %path.display(), "directory still has content");
                removable = false;
            }
        }

        if !removable {
            summary.kept += 1;
            return Ok(false);
        }

        if self.dry_run {
            info!(dir = %dir.display(), junk = junk.len(), "dry-run: would remove directory");
            summary.removed += 1;
            return Ok(true);
        }

        for file in &junk {
            self.trash.delete_permanently(file)?;
        }
        match fs::remove_dir(dir) {
            Ok(()) => {
                self.stats.record(Counter::DirectoriesDeleted);
                summary.removed += 1;
                info!(dir = %dir.display(), junk = junk.len(), "removed empty directory");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(dir = %dir.display(), "permission denied removing directory");
                summary.kept += 1;
                Ok(false)
            }
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                // Something arrived after the scan.
                debug!(dir = %dir.display(), "directory refilled; keeping it");
                summary.kept += 1;
                Ok(false)
            }
            Err(e) => Err(SyncError::io("remove directory", dir)(e)),
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn setup(dry_run: bool) -> (TempDir, DirectoryReaper, Arc<StatsRegistry>) {
        let td = tempdir().unwrap();
        let stats = Arc::new(StatsRegistry::new());
        let trash = Arc::new(
            TrashManager::new(td.path().join(TRASH_DIR_NAME), Arc::clone(&stats)).with_dry_run(dry_run),
        );
        let reaper = DirectoryReaper::new(trash, Arc::clone(&stats), dry_run).protect(td.path());
        (td, reaper, stats)
    }

    #[test]
    fn junk_only_directory_is_removed() {
        let (td, reaper, stats) = setup(false);
        let d = td.path().join("card");
        fs::create_dir(&d).unwrap();
        fs::write(d.join(".DS_Store"), b"meta").unwrap();
        fs::write(d.join("Thumbs.db"), b"thumbs").unwrap();

        assert!(reaper.reap_if_empty(&d).unwrap());
        assert!(!d.exists());
        assert_eq!(stats.get(Counter::DirectoriesDeleted), 1);
        assert_eq!(stats.get(Counter::FilesDeleted), 2);
    }

    #[test]
    fn one_real_file_keeps_everything() {
        let (td, reaper, stats) = setup(false);
        let d = td.path().join("card");
        fs::create_dir(&d).unwrap();
        fs::write(d.join(".DS_Store"), b"meta").unwrap();
        fs::write(d.join("Thumbs.db"), b"thumbs").unwrap();
        fs::write(d.join("note.md"), b"keep me").unwrap();

        assert!(!reaper.reap_if_empty(&d).unwrap());
        assert!(d.join(".DS_Store").exists());
        assert!(d.join("note.md").exists());
        assert_eq!(stats.get(Counter::FilesDeleted), 0);
    }

    #[test]
    fn nested_empty_directories_go_bottom_up() {
        let (td, reaper, stats) = setup(false);
        let d = td.path().join("DCIM/100CANON/sub");
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join("desktop.ini"), b"").unwrap();

        assert!(reaper.reap_if_empty(&td.path().join("DCIM")).unwrap());
        assert!(!td.path().join("DCIM").exists());
        assert_eq!(stats.get(Counter::DirectoriesDeleted), 3);
    }

    #[test]
    fn kept_child_keeps_parent_but_siblings_may_go() {
        let (td, reaper, _) = setup(false);
        let root = td.path().join("DCIM");
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join("full")).unwrap();
        fs::write(root.join("full/IMG_1.jpg"), b"img").unwrap();

        let summary = reaper.reap_tree(td.path()).unwrap();
        assert!(root.exists());
        assert!(!root.join("empty").exists());
        assert!(root.join("full/IMG_1.jpg").exists());
        assert_eq!(summary, ReapSummary { removed: 1, kept: 2 });
    }

    #[test]
    fn protected_and_trash_directories_stay() {
        let (td, reaper, _) = setup(false);
        fs::create_dir_all(td.path().join(".trash/0000")).unwrap();
        assert!(!reaper.reap_if_empty(td.path()).unwrap());
        assert!(td.path().join(".trash/0000").exists());
        assert!(td.path().exists());
    }

    #[test]
    fn dry_run_reports_but_keeps() {
        let (td, reaper, stats) = setup(true);
        let d = td.path().join("card");
        fs::create_dir(&d).unwrap();
        fs::write(d.join(".DS_Store"), b"").unwrap();

        assert!(reaper.reap_if_empty(&d).unwrap());
        assert!(d.join(".DS_Store").exists());
        assert_eq!(stats.get(Counter::DirectoriesDeleted), 0);
    }

    #[test]
    fn missing_directory_counts_as_gone() {
        let (td, reaper, _) = setup(false);
        assert!(reaper.reap_if_empty(&td.path().join("nope")).unwrap());
    }
}
