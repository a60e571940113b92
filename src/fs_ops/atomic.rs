//! No-clobber rename helper.
//! - Refuses to rename onto an existing path (the engine never overwrites). The refusal
//!   is decided by the kernel, so two callers racing for one name cannot both win.
//! - Linux: `renameat2(RENAME_NOREPLACE)`. Elsewhere, or where the filesystem rejects
//!   that flag: hard link into place, then unlink the source.
//! - On Unix, best-effort fsync of the destination directory after rename.
//! - Returns the raw io::Error so callers can detect EXDEV and fall back to copying.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use super::util::fsync_dir;

pub fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    rename_noreplace(src, dst)?;

    if let Some(parent) = dst.parent() {
        // A failed directory fsync must not turn a completed rename into a failure.
        let _ = fsync_dir(parent);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = |p: &Path| {
        CString::new(p.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains null byte"))
    };
    let c_src = c_path(src)?;
    let c_dst = c_path(dst)?;

    // SAFETY: both pointers are valid NUL-terminated strings that outlive the call.
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            c_src.as_ptr(),
            libc::AT_FDCWD,
            c_dst.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Old kernels, and filesystems (NFS, some FUSE) that do not take the flag.
        Some(libc::EINVAL) | Some(libc::ENOSYS) => link_then_unlink(src, dst),
        _ => Err(err),
    }
}

#[cfg(not(target_os = "linux"))]
fn rename_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    link_then_unlink(src, dst)
}

/// Creating the link claims `dst` atomically (EEXIST when taken, EXDEV across devices).
fn link_then_unlink(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::hard_link(src, dst) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(src) {
                // dst is our own link; drop it so the source stays the only copy.
                let _ = fs::remove_file(dst);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if links_unsupported(&e) => {
            debug!(src = %src.display(), dest = %dst.display(), error = %e, "hard links unsupported; checked rename");
            rename_checked(src, dst)
        }
        Err(e) => Err(e),
    }
}

fn links_unsupported(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(e.raw_os_error(), Some(libc::EPERM | libc::EOPNOTSUPP | libc::EMLINK))
    }
    #[cfg(not(unix))]
    {
        false
    }
}

// Last resort for filesystems with neither RENAME_NOREPLACE nor hard links (FAT, some SMB).
fn rename_checked(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination exists: {}", dst.display()),
        ));
    }
    fs::rename(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn renames_into_free_slot() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.jpg");
        let b = td.path().join("b.jpg");
        fs::write(&a, b"X").unwrap();
        try_atomic_move(&a, &b).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"X");
    }

    #[test]
    fn never_replaces_existing_destination() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.jpg");
        let b = td.path().join("b.jpg");
        fs::write(&a, b"X").unwrap();
        fs::write(&b, b"Y").unwrap();
        let err = try_atomic_move(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&b).unwrap(), b"Y");
        assert!(a.exists());
    }

    #[test]
    fn link_fallback_moves_and_refuses_occupied_slot() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.jpg");
        let b = td.path().join("b.jpg");
        let c = td.path().join("c.jpg");
        fs::write(&a, b"X").unwrap();
        fs::write(&c, b"Z").unwrap();

        link_then_unlink(&a, &b).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"X");

        let err = link_then_unlink(&c, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&b).unwrap(), b"X");
        assert_eq!(fs::read(&c).unwrap(), b"Z");
    }

    #[test]
    fn racing_moves_onto_one_name_have_a_single_winner() {
        let td = tempdir().unwrap();
        for i in 0..500 {
            let dir = td.path().join(format!("r{i}"));
            fs::create_dir(&dir).unwrap();
            let a = dir.join("a.jpg");
            let b = dir.join("b.jpg");
            let out = dir.join("out.jpg");
            fs::write(&a, b"AAAA").unwrap();
            fs::write(&b, b"BBBB").unwrap();

            let gate = Barrier::new(2);
            let (ra, rb) = thread::scope(|s| {
                let ha = s.spawn(|| {
                    gate.wait();
                    try_atomic_move(&a, &out)
                });
                let hb = s.spawn(|| {
                    gate.wait();
                    try_atomic_move(&b, &out)
                });
                (ha.join().unwrap(), hb.join().unwrap())
            });

            assert!(ra.is_ok() != rb.is_ok(), "iteration {i}: {ra:?} / {rb:?}");
            let loser = if ra.is_ok() { &b } else { &a };
            let err = if ra.is_ok() { rb.unwrap_err() } else { ra.unwrap_err() };
            assert_eq!(err.kind(), io::ErrorKind::AlreadyExists, "iteration {i}");
            assert!(loser.exists(), "iteration {i}: losing source vanished");
            let kept = fs::read(&out).unwrap();
            let expected: &[u8] = if loser == &a { b"BBBB" } else { b"AAAA" };
            assert_eq!(kept, expected, "iteration {i}");
        }
    }
}
