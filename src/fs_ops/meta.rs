//! Metadata preservation for in-process copies.
//! Carries mtime (needed so a later run sees the copy as a duplicate, not a conflict),
//! atime and Unix permission bits from source to destination.

use filetime::{FileTime, set_file_times};
use std::fs::Metadata;
use std::path::Path;

use crate::errors::SyncError;

pub fn preserve_times_and_mode(src_meta: &Metadata, dest: &Path) -> Result<(), SyncError> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    set_file_times(dest, atime, mtime).map_err(SyncError::io("set file times", dest))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = src_meta.permissions().mode() & 0o777;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))
            .map_err(SyncError::io("set permissions", dest))?;
    }
    Ok(())
}
