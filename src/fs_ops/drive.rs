//! Drive-root detection for the default trash location.
//!
//! Order:
//! 1. Mount layouts that name the volume: `/mnt/<name>`, `/media/<user>/<name>`,
//!    `/run/media/<user>/<name>`, `/Volumes/<name>`, or a Windows drive letter.
//! 2. The highest ancestor that still shares the directory's device id (the mount point).
//! 3. If that walk reaches the filesystem root, the directory itself; writing a trash
//!    into `/` is never what the user wants.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::platform::file_identity;

fn mount_layout() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(/mnt/[\w .-]+|/media/[^/]+/[^/]+|/run/media/[^/]+/[^/]+|/Volumes/[^/]+|[A-Za-z]:)(?:[/\\]|$)",
        )
        .ok()
    })
    .as_ref()
}

/// Best guess at the root of the volume holding `dir`.
pub fn guess_drive_root(dir: &Path) -> PathBuf {
    let text = dir.to_string_lossy();
    if let Some(caps) = mount_layout().and_then(|re| re.captures(&text))
        && let Some(m) = caps.get(1)
    {
        let root = m.as_str();
        // "C:" alone means "current dir on C"; the root is "C:\".
        if root.len() == 2 && root.ends_with(':') {
            return PathBuf::from(format!("{root}{}", std::path::MAIN_SEPARATOR));
        }
        return PathBuf::from(root);
    }

    match mount_point(dir) {
        Some(mp) if mp.parent().is_some() => mp,
        _ => dir.to_path_buf(),
    }
}

fn device_of(p: &Path) -> Option<u64> {
    fs::metadata(p)
        .ok()
        .and_then(|m| file_identity(&m))
        .map(|id| id.device)
}

/// Highest ancestor of `dir` on the same device. None when identity is unavailable.
fn mount_point(dir: &Path) -> Option<PathBuf> {
    let dev = device_of(dir)?;
    let mut top = dir.to_path_buf();
    for anc in dir.ancestors().skip(1) {
        match device_of(anc) {
            Some(d) if d == dev => top = anc.to_path_buf(),
            _ => break,
        }
    }
    Some(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_mounts_are_recognized() {
        assert_eq!(
            guess_drive_root(Path::new("/mnt/photo-drive/Incoming/2024")),
            Path::new("/mnt/photo-drive")
        );
        assert_eq!(
            guess_drive_root(Path::new("/media/jess/SD_CARD/DCIM")),
            Path::new("/media/jess/SD_CARD")
        );
        assert_eq!(guess_drive_root(Path::new("/Volumes/Backup")), Path::new("/Volumes/Backup"));
    }

    #[test]
    fn drive_letters_map_to_their_root() {
        let root = guess_drive_root(Path::new(r"D:\Pictures\Inbox"));
        assert_eq!(root, PathBuf::from(format!("D:{}", std::path::MAIN_SEPARATOR)));
    }

    #[cfg(unix)]
    #[test]
    fn plain_directories_fall_back_to_mount_point_or_self() {
        let td = tempfile::tempdir().unwrap();
        let root = guess_drive_root(td.path());
        assert!(td.path().starts_with(&root), "{} vs {}", root.display(), td.path().display());
        assert_ne!(root, Path::new("/"));
    }
}
