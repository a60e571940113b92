//! Typed error definitions for the sync engine.
//! A small set of well-known failure modes so the pool can decide what to retry,
//! what to record and what must stop the run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::fs_ops::helpers::io_hint;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid path '{}': {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// Source and destination are the same inode. Never expected inside the engine.
    #[error("Source and destination are the same file: {}", .0.display())]
    SameFile(PathBuf),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("No unique destination for {} after {attempts} attempts (last tried {})", .src.display(), .last.display())]
    ExhaustedAttempts {
        src: PathBuf,
        last: PathBuf,
        attempts: u32,
    },

    #[error("Checksum mismatch copying {} -> {}; destination quarantined at {}", .src.display(), .dest.display(), .quarantined.display())]
    ChecksumMismatch {
        src: PathBuf,
        dest: PathBuf,
        quarantined: PathBuf,
    },

    #[error("{tool} failed copying {} -> {}: {detail}", .src.display(), .dest.display())]
    CopyFailed {
        tool: &'static str,
        src: PathBuf,
        dest: PathBuf,
        detail: String,
    },

    #[error("{tool} timed out after {}s copying {} -> {}", .timeout.as_secs(), .src.display(), .dest.display())]
    Timeout {
        tool: &'static str,
        src: PathBuf,
        dest: PathBuf,
        timeout: Duration,
    },

    #[error("Insufficient disk space for destination {}: need {required} bytes, have {available} bytes", .dest.display())]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },

    #[error("{op} '{}': {source}{}", .path.display(), io_hint(.source))]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl SyncError {
    /// Build a closure for `.map_err(..)` that wraps an io::Error with op/path context.
    /// A NotFound error becomes `FileNotFound` so callers can match on it directly.
    pub fn io<'a>(op: &'static str, path: &'a std::path::Path) -> impl FnOnce(io::Error) -> SyncError + 'a {
        move |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                SyncError::FileNotFound(path.to_path_buf())
            } else {
                SyncError::Io {
                    op,
                    path: path.to_path_buf(),
                    source,
                }
            }
        }
    }

    /// Stable snake_case label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::FileNotFound(_) => "file_not_found",
            SyncError::InvalidPath { .. } => "invalid_path",
            SyncError::SameFile(_) => "same_file",
            SyncError::DestinationExists(_) => "destination_exists",
            SyncError::ExhaustedAttempts { .. } => "exhausted_attempts",
            SyncError::ChecksumMismatch { .. } => "checksum_mismatch",
            SyncError::CopyFailed { .. } => "copy_failed",
            SyncError::Timeout { .. } => "timeout",
            SyncError::InsufficientSpace { .. } => "insufficient_space",
            SyncError::Io { .. } => "io",
            SyncError::Config(_) => "config",
            SyncError::Interrupted => "interrupted",
        }
    }

    /// Stable numeric code, handy for scripts that grep logs.
    pub fn code(&self) -> i32 {
        match self {
            SyncError::FileNotFound(_) => 10,
            SyncError::InvalidPath { .. } => 11,
            SyncError::SameFile(_) => 12,
            SyncError::DestinationExists(_) => 13,
            SyncError::ExhaustedAttempts { .. } => 14,
            SyncError::ChecksumMismatch { .. } => 20,
            SyncError::CopyFailed { .. } => 21,
            SyncError::Timeout { .. } => 22,
            SyncError::InsufficientSpace { .. } => 23,
            SyncError::Io { .. } => 30,
            SyncError::Config(_) => 40,
            SyncError::Interrupted => 130,
        }
    }

    /// Errors worth another copy attempt: tool failures, timeouts, a destination that
    /// vanished after the tool reported success, and permission hiccups.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::CopyFailed { .. } | SyncError::Timeout { .. } => true,
            SyncError::FileNotFound(_) => true,
            SyncError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::PermissionDenied
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::BrokenPipe
            ) || self.is_host_down(),
            _ => false,
        }
    }

    /// Network mounts report a lost server as ENOTCONN / EHOSTDOWN.
    pub fn is_host_down(&self) -> bool {
        let SyncError::Io { source, .. } = self else {
            return false;
        };
        match source.raw_os_error() {
            #[cfg(unix)]
            Some(code) => code == libc::ENOTCONN || code == libc::EHOSTDOWN,
            #[cfg(not(unix))]
            Some(_) => false,
            None => false,
        }
    }

    /// Invariant and configuration failures stop the whole run.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            SyncError::SameFile(_) | SyncError::Config(_) | SyncError::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn not_found_maps_to_file_not_found() {
        let err = SyncError::io("open", Path::new("/nope"))(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SyncError::FileNotFound(ref p) if p == Path::new("/nope")));
        assert!(err.is_transient());
    }

    #[test]
    fn checksum_mismatch_is_not_retried() {
        let err = SyncError::ChecksumMismatch {
            src: "/a".into(),
            dest: "/b".into(),
            quarantined: "/b-corrupt".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_fatal_for_run());
        assert_eq!(err.kind(), "checksum_mismatch");
    }

    #[test]
    fn same_file_aborts_the_run() {
        let err = SyncError::SameFile("/x".into());
        assert!(err.is_fatal_for_run());
        assert!(!err.is_transient());
    }

    #[cfg(unix)]
    #[test]
    fn host_down_is_detected_from_errno() {
        let err = SyncError::Io {
            op: "stat",
            path: "/mnt/nas/a.jpg".into(),
            source: io::Error::from_raw_os_error(libc::EHOSTDOWN),
        };
        assert!(err.is_host_down());
        assert!(err.is_transient());
        let msg = err.to_string();
        assert!(msg.contains("/mnt/nas/a.jpg"), "message: {msg}");
    }
}
