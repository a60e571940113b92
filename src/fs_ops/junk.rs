//! Junk classification.
//! Decides which leftover files may be unlinked without asking when they are the only
//! thing keeping a directory alive. Rules, most to least permissive:
//! - always: OS/app litter names (`.DS_Store`, `Thumbs.db`, `desktop.ini`, ...)
//! - under 10 KiB: camera index files (Sony card layout), iOS `.AAE` edit sidecars
//! - under 50 bytes: hidden files and temp/swap files
//! - empty: extension-less or `.txt` marker files

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

const JUNK_FILENAMES: &[&str] = &[
    ".picasa.ini",
    "desktop.ini",
    "Thumbs.db",
    ".DS_Store",
    "._.DS_Store",
    ".upload_status.txt",
    "upload_status.txt",
];

const CAMERA_INDEX_FILENAMES: &[&str] = &[
    "INDEX.BDM",
    "MOVIEOBJ.BDM",
    "MEDIAPRO.XML",
    "STATUS.BIN",
    "CAMSET01.DAT",
    "SONYCARD.IND",
];

const SMALL_LIMIT: u64 = 10 * 1024;
const TINY_LIMIT: u64 = 50;

fn clip_index() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[/\\])M4ROOT[/\\]CLIP[/\\]\w+\.(?:xml|XML)$").ok())
        .as_ref()
}

fn has_ext(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Editor swap/temp files: `.tmp`, `.swp`, `~lock`, or extension-less `tmp_*` / `*_temp`.
pub fn is_temporary(name: &str) -> bool {
    if has_ext(name, "tmp") || has_ext(name, "swp") || name.starts_with('~') {
        return true;
    }
    if Path::new(name).extension().is_none() {
        let lower = name.to_ascii_lowercase();
        return lower.starts_with("tmp_")
            || lower.starts_with("temp_")
            || lower.ends_with("_tmp")
            || lower.ends_with("_temp");
    }
    false
}

/// Whether the file at `path` with `size` bytes is disposable litter.
pub fn is_junk(path: &Path, size: u64) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    if JUNK_FILENAMES.contains(&name) {
        return true;
    }

    if size < SMALL_LIMIT {
        if CAMERA_INDEX_FILENAMES.contains(&name) || has_ext(name, "aae") {
            return true;
        }
        let text = path.to_string_lossy();
        if clip_index().is_some_and(|re| re.is_match(&text)) {
            return true;
        }
    }

    if size < TINY_LIMIT && (name.starts_with('.') || is_temporary(name)) {
        return true;
    }

    size == 0 && (Path::new(name).extension().is_none() || has_ext(name, "txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn litter_names_are_junk_at_any_size() {
        assert!(is_junk(Path::new("/a/.DS_Store"), 1 << 20));
        assert!(is_junk(Path::new("/a/Thumbs.db"), 300_000));
        assert!(!is_junk(Path::new("/a/thumbs.jpg"), 10));
    }

    #[test]
    fn camera_index_files_only_when_small() {
        assert!(is_junk(Path::new("/card/PRIVATE/M4ROOT/MEDIAPRO.XML"), 2048));
        assert!(!is_junk(Path::new("/card/PRIVATE/M4ROOT/MEDIAPRO.XML"), 20 * 1024));
        assert!(is_junk(Path::new("/card/PRIVATE/M4ROOT/CLIP/C0001M01.XML"), 900));
        assert!(!is_junk(Path::new("/card/PRIVATE/M4ROOT/CLIP/C0001.MP4"), 900));
    }

    #[test]
    fn tiny_hidden_and_temp_files() {
        assert!(is_junk(Path::new("/a/.hidden"), 10));
        assert!(!is_junk(Path::new("/a/.hidden"), 500));
        assert!(is_junk(Path::new("/a/~$report.docx"), 12));
        assert!(is_junk(Path::new("/a/tmp_upload"), 3));
        assert!(!is_junk(Path::new("/a/tmp_upload.jpg"), 3));
    }

    #[test]
    fn empty_markers() {
        assert!(is_junk(Path::new("/a/done.txt"), 0));
        assert!(is_junk(Path::new("/a/MARKER"), 0));
        assert!(!is_junk(Path::new("/a/note.md"), 0));
        assert!(!is_junk(Path::new("/a/done.txt"), 1));
    }

    #[test]
    fn temporary_patterns() {
        assert!(is_temporary("scratch.TMP"));
        assert!(is_temporary(".notes.swp"));
        assert!(is_temporary("render_temp"));
        assert!(!is_temporary("template"));
    }
}
