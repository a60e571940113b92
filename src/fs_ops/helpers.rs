//! I/O helper utilities.
//!
//! Turns raw io::Error codes into short actionable hints. Used by `SyncError::Io`'s
//! Display impl and by the anyhow-based config code through `io_error_with_help`.
//!
//! Usage:
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create dir", dir))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Platform-aware hint for an io::Error, including the raw OS code when present.
/// Returns an empty string when nothing useful can be said.
pub fn io_hint(e: &io::Error) -> String {
    let mut msg = String::new();

    if let Some(code) = e.raw_os_error() {
        #[cfg(unix)]
        {
            let hint = match code {
                libc::EACCES | libc::EPERM => " (permission denied; check ownership and write permissions)",
                libc::EXDEV => " (cross-filesystem; rename not possible, a verified copy is required)",
                libc::EBUSY => " (resource busy; another process may be writing)",
                libc::ENOENT => " (path not found)",
                libc::EEXIST => " (already exists)",
                libc::ENOSPC => " (no space left on device)",
                libc::EROFS => " (read-only filesystem)",
                libc::ENAMETOOLONG => " (file name too long)",
                libc::ENOTCONN | libc::EHOSTDOWN => " (network mount unavailable; host down)",
                libc::EMFILE | libc::ENFILE => " (too many open files)",
                _ => "",
            };
            msg.push_str(hint);
        }
        #[cfg(windows)]
        {
            let hint = match code {
                5 => " (access denied)",        // ERROR_ACCESS_DENIED
                17 => " (not same device)",     // ERROR_NOT_SAME_DEVICE
                32 => " (sharing violation; file is in use)",
                2 | 3 => " (path not found)",
                80 => " (already exists)",      // ERROR_FILE_EXISTS
                112 => " (disk full)",
                19 => " (write protected media)",
                206 => " (file name or path too long)",
                _ => "",
            };
            msg.push_str(hint);
        }
        msg.push_str(&format!(" [os code: {code}]"));
    } else {
        match e.kind() {
            io::ErrorKind::PermissionDenied => msg.push_str(" (permission denied)"),
            io::ErrorKind::AlreadyExists => msg.push_str(" (already exists)"),
            io::ErrorKind::TimedOut => msg.push_str(" (timed out)"),
            _ => {}
        }
    }
    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!("{} '{}': {}{}", op, path.display(), e, io_hint(&e))
}
