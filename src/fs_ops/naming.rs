//! Suffix-based name generation.
//!
//! Every alternate name the engine produces is `<stem><suffix>[.<ext>]` beside the
//! original:
//! - collisions: `a.jpg` -> `a_0.jpg`, `a_1.jpg`, ...
//! - quarantine: `a.jpg` -> `a-corrupt.jpg`, then `a-corrupt_0.jpg`, ...
//! - trash entries reuse the collision pattern inside a shard.
//!
//! Notes:
//! - Names are trimmed so the result fits common filename limits; the stem shrinks,
//!   the suffix and extension never do.
//! - Non-UTF8 names are preserved through OsString.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

// Conservative filename limits (bytes/characters, platform-specific and approximate).
#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Truncate the stem so `stem + suffix + ["." + ext]` fits within MAX_FILENAME_LEN.
fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = suffix.len();
    if let Some(e) = ext {
        overhead += 1 + name_len_units(e);
    }

    let mut stem_os = stem.to_os_string();
    if name_len_units(&stem_os) + overhead > MAX_FILENAME_LEN {
        let budget = MAX_FILENAME_LEN.saturating_sub(overhead).max(1);
        stem_os = truncate_stem(stem, budget);
    }

    let mut name = stem_os;
    name.push(suffix);
    if let Some(e) = ext {
        name.push(".");
        name.push(e);
    }
    name
}

fn truncate_stem(stem: &OsStr, budget: usize) -> OsString {
    if let Some(s) = stem.to_str() {
        let mut acc = String::new();
        for ch in s.chars() {
            if acc.len() + ch.len_utf8() > budget {
                break;
            }
            acc.push(ch);
        }
        if acc.is_empty() {
            acc.push('f');
        }
        return OsString::from(acc);
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        let bytes = stem.as_bytes();
        OsString::from_vec(bytes[..bytes.len().min(budget)].to_vec())
    }
    #[cfg(not(unix))]
    {
        let lossy = stem.to_string_lossy().into_owned();
        truncate_stem(OsStr::new(&lossy), budget)
    }
}

/// `<parent>/<stem><suffix>[.<ext>]` for the file name of `path`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    let ext = path.extension();
    path.with_file_name(build_name_with_suffix(&stem, ext, suffix))
}

/// The `i`-th collision candidate: `a.jpg` -> `a_<i>.jpg`.
pub fn collision_candidate(path: &Path, i: u32) -> PathBuf {
    with_suffix(path, &format!("_{i}"))
}

/// First free quarantine name beside `path`: `a-corrupt.jpg`, then `a-corrupt_0.jpg`, ...
/// `taken` decides occupancy so callers can include sidecars or in-flight names.
pub fn corrupt_candidate(path: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    let first = with_suffix(path, "-corrupt");
    if !taken(&first) {
        return first;
    }
    let mut i: u64 = 0;
    loop {
        let candidate = with_suffix(path, &format!("-corrupt_{i}"));
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}
