//! Copy primitives.
//!
//! The transfer layer treats a primitive as a black box taking `(src, dst, timeout)` that
//! either produces the destination or fails. It never trusts the result: every copy is
//! re-hashed afterwards.
//!
//! - `RsyncCopy` shells out to `rsync -a --times` into a hidden staging directory next to
//!   the destination and kills it once the timeout expires. The staging directory is
//!   removed whatever happens.
//! - `StreamCopy` copies in-process into a hidden temp sibling.
//!
//! Both finish with a no-clobber rename, so a destination another worker claimed in the
//! meantime surfaces as `DestinationExists` instead of being overwritten.

use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::atomic::try_atomic_move;
use super::io_copy::copy_streaming;
use super::meta::preserve_times_and_mode;
use super::util::find_on_path;
use crate::config::CopyTool;
use crate::errors::SyncError;
use crate::platform::tmp_sibling_name;

const MIB: f64 = 1024.0 * 1024.0;
const BASE_TIMEOUT_SECS: f64 = 60.0;
const SECS_PER_MIB: f64 = 10.0;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `60s + 10s per MiB` of source size.
pub fn copy_timeout(size: u64) -> Duration {
    Duration::from_secs_f64(BASE_TIMEOUT_SECS + size as f64 / MIB * SECS_PER_MIB)
}

pub trait CopyPrimitive: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce `dst` with the content of `src`. `dst` does not exist on entry.
    fn copy(&self, src: &Path, dst: &Path, timeout: Duration) -> Result<(), SyncError>;
}

/// External `rsync` process.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsyncCopy;

impl CopyPrimitive for RsyncCopy {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn copy(&self, src: &Path, dst: &Path, timeout: Duration) -> Result<(), SyncError> {
        let staging = tmp_sibling_name(dst, "rsync");
        fs::create_dir(&staging).map_err(SyncError::io("create staging directory", &staging))?;

        let result = self
            .run(src, &staging.join(staged_name(dst)), dst, timeout)
            .and_then(|staged| claim(&staged, dst));

        // Also sweeps the `.name.XXXXXX` file a killed rsync leaves behind.
        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!(staging = %staging.display(), error = %e, "failed to remove rsync staging directory");
        }
        result
    }
}

impl RsyncCopy {
    /// Copy `src` to `staged`, killing rsync once `timeout` expires. `dst` names the
    /// final destination in errors.
    fn run(&self, src: &Path, staged: &Path, dst: &Path, timeout: Duration) -> Result<PathBuf, SyncError> {
        let failed = |detail: String| SyncError::CopyFailed {
            tool: "rsync",
            src: src.to_path_buf(),
            dest: dst.to_path_buf(),
            detail,
        };

        let mut child = Command::new("rsync")
            .arg("-a")
            .arg("--times")
            .arg("--ignore-existing")
            .arg(src)
            .arg(staged)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("failed to start: {e}")))?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(src = %src.display(), dest = %dst.display(), timeout_s = timeout.as_secs(), "rsync timed out; killed");
                    return Err(SyncError::Timeout {
                        tool: "rsync",
                        src: src.to_path_buf(),
                        dest: dst.to_path_buf(),
                        timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(failed(format!("wait failed: {e}"))),
            }
        };

        if status.success() {
            debug!(src = %src.display(), dest = %dst.display(), "rsync finished");
            return Ok(staged.to_path_buf());
        }
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(failed(format!("{status}: {}", stderr.trim())))
    }
}

fn staged_name(dst: &Path) -> &OsStr {
    dst.file_name().unwrap_or_else(|| OsStr::new("staged"))
}

/// Rename a finished temp copy onto `dst` without replacing anything there.
fn claim(tmp: &Path, dst: &Path) -> Result<(), SyncError> {
    try_atomic_move(tmp, dst).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            SyncError::DestinationExists(dst.to_path_buf())
        } else {
            SyncError::io("rename temp into place", dst)(e)
        }
    })
}

/// In-process copy. Never leaves a partial file at `dst`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamCopy;

impl CopyPrimitive for StreamCopy {
    fn name(&self) -> &'static str {
        "stream"
    }

    // Runs to completion; the timeout only bounds external tools.
    fn copy(&self, src: &Path, dst: &Path, _timeout: Duration) -> Result<(), SyncError> {
        let src_meta = fs::metadata(src).map_err(SyncError::io("stat source", src))?;
        let tmp = tmp_sibling_name(dst, "copy");

        let result = copy_streaming(src, &tmp)
            .map_err(SyncError::io("copy to temp", &tmp))
            .and_then(|_| preserve_times_and_mode(&src_meta, &tmp))
            .and_then(|_| claim(&tmp, dst));

        if result.is_err()
            && fs::symlink_metadata(&tmp).is_ok()
            && let Err(e) = fs::remove_file(&tmp)
        {
            warn!(tmp = %tmp.display(), error = %e, "failed to remove temp file after copy failure");
        }
        result
    }
}

/// Primitive for the configured tool. `auto` prefers rsync when it is on PATH.
pub fn select_copier(tool: CopyTool) -> Arc<dyn CopyPrimitive> {
    match tool {
        CopyTool::Rsync => Arc::new(RsyncCopy),
        CopyTool::Stream => Arc::new(StreamCopy),
        CopyTool::Auto => {
            if find_on_path("rsync").is_some() {
                Arc::new(RsyncCopy)
            } else {
                debug!("rsync not found on PATH; using in-process copy");
                Arc::new(StreamCopy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::tempdir;

    #[test]
    fn timeout_scales_with_size() {
        assert_eq!(copy_timeout(0), Duration::from_secs(60));
        assert_eq!(copy_timeout(50 * 1024 * 1024), Duration::from_secs(560));
        assert_eq!(copy_timeout(512 * 1024), Duration::from_secs(65));
    }

    #[test]
    fn stream_copy_preserves_content_and_mtime() {
        let td = tempdir().unwrap();
        let src = td.path().join("a.jpg");
        let dst = td.path().join("out.jpg");
        fs::write(&src, b"payload").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        StreamCopy.copy(&src, &dst, copy_timeout(7)).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        assert!(src.exists());
        let got = FileTime::from_last_modification_time(&fs::metadata(&dst).unwrap());
        assert_eq!(got, old);
    }

    #[test]
    fn stream_copy_refuses_existing_destination_and_cleans_temp() {
        let td = tempdir().unwrap();
        let src = td.path().join("a.jpg");
        let dst = td.path().join("b.jpg");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        let err = StreamCopy.copy(&src, &dst, copy_timeout(3)).unwrap_err();
        assert!(matches!(err, SyncError::DestinationExists(_)));
        assert_eq!(fs::read(&dst).unwrap(), b"old");
        let leftovers: Vec<_> = fs::read_dir(td.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn rsync_available() -> bool {
        find_on_path("rsync").is_some()
    }

    fn hidden_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    #[test]
    fn rsync_copy_lands_in_place_and_leaves_no_staging() {
        if !rsync_available() {
            return;
        }
        let td = tempdir().unwrap();
        let src = td.path().join("in.jpg");
        let out = td.path().join("out");
        fs::create_dir(&out).unwrap();
        let dst = out.join("a.jpg");
        fs::write(&src, b"payload").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        RsyncCopy.copy(&src, &dst, copy_timeout(7)).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        let got = FileTime::from_last_modification_time(&fs::metadata(&dst).unwrap());
        assert_eq!(got, old);
        assert!(hidden_leftovers(&out).is_empty(), "{:?}", hidden_leftovers(&out));
    }

    #[test]
    fn rsync_copy_refuses_existing_destination() {
        if !rsync_available() {
            return;
        }
        let td = tempdir().unwrap();
        let src = td.path().join("a.jpg");
        let dst = td.path().join("b.jpg");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        let err = RsyncCopy.copy(&src, &dst, copy_timeout(3)).unwrap_err();
        assert!(matches!(err, SyncError::DestinationExists(_)), "{err:?}");
        assert_eq!(fs::read(&dst).unwrap(), b"old");
        assert!(hidden_leftovers(td.path()).is_empty());
    }

    #[test]
    fn expired_rsync_is_killed_and_cleaned_up() {
        if !rsync_available() {
            return;
        }
        let td = tempdir().unwrap();
        let src = td.path().join("big.mov");
        let out = td.path().join("out");
        fs::create_dir(&out).unwrap();
        let dst = out.join("big.mov");
        fs::write(&src, vec![7u8; 32 * 1024 * 1024]).unwrap();

        // A zero budget expires on the first poll, before rsync can get far.
        match RsyncCopy.copy(&src, &dst, Duration::ZERO) {
            Err(SyncError::Timeout { tool, timeout, .. }) => {
                assert_eq!(tool, "rsync");
                assert_eq!(timeout, Duration::ZERO);
                assert!(!dst.exists());
            }
            // Only possible if rsync exited before the first poll.
            Ok(()) => assert_eq!(fs::metadata(&dst).unwrap().len(), 32 * 1024 * 1024),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
        assert!(hidden_leftovers(&out).is_empty(), "{:?}", hidden_leftovers(&out));
        assert!(src.exists());
    }

    #[test]
    fn forced_tools_are_honoured() {
        assert_eq!(select_copier(CopyTool::Stream).name(), "stream");
        assert_eq!(select_copier(CopyTool::Rsync).name(), "rsync");
    }
}
