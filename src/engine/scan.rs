//! Directory scanning.
//!
//! Produces one batch per directory, deepest directories first, so a directory is only
//! reaped after everything below it has been processed. Hidden directories and `.trash`
//! trees are never entered. The listing is taken up front; files moved into the tree
//! during the run are not picked up again.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::organizer::Organizer;
use crate::fs_ops::TRASH_DIR_NAME;

/// Files of one directory (non-recursive), sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBatch {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.') || n == TRASH_DIR_NAME)
}

/// Walk `root` children-first and collect matching files per directory.
pub fn scan(root: &Path, organizer: &dyn Organizer) -> Vec<DirectoryBatch> {
    let mut batches = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.into_path();
        let files = list_files(&dir, organizer);
        debug!(dir = %dir.display(), files = files.len(), "scanned directory");
        batches.push(DirectoryBatch { dir, files });
    }
    batches
}

fn list_files(dir: &Path, organizer: &dyn Organizer) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .filter(|p| organizer.matches(p))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::organizer::DateOrganizer;
    use tempfile::tempdir;

    #[test]
    fn children_come_before_parents_and_hidden_trees_are_skipped() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join(".trash/0000")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("a/b/2.jpg"), b"2").unwrap();
        fs::write(root.join("a/b/1.JPG"), b"1").unwrap();
        fs::write(root.join("a/notes.txt"), b"n").unwrap();
        fs::write(root.join(".trash/0000/x.jpg"), b"x").unwrap();
        fs::write(root.join(".cache/y.jpg"), b"y").unwrap();

        let org = DateOrganizer::new(&["jpg".to_string()]);
        let batches = scan(root, &org);
        let dirs: Vec<_> = batches.iter().map(|b| b.dir.clone()).collect();
        assert_eq!(dirs, vec![root.join("a/b"), root.join("a"), root.to_path_buf()]);
        assert_eq!(batches[0].files, vec![root.join("a/b/1.JPG"), root.join("a/b/2.jpg")]);
        assert!(batches[1].files.is_empty());
    }
}
