#![allow(dead_code)]

use chrono::{Local, NaiveDate, TimeZone};
use filetime::{FileTime, set_file_mtime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mediasort::{Config, CopyTool};

/// Local noon on the given day, so date directories do not depend on the time zone.
pub fn local_noon(y: i32, m: u32, d: u32) -> FileTime {
    let dt = NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    FileTime::from_unix_time(Local.from_local_datetime(&dt).unwrap().timestamp(), 0)
}

/// Write `body` to `path` (creating parents) with the given mtime.
pub fn write_file(path: &Path, body: &[u8], mtime: FileTime) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
    set_file_mtime(path, mtime).unwrap();
}

/// Validated config for `root/in` -> `root/out`, trash at `root/trash`, in-process copies.
pub fn config(root: &Path) -> Config {
    let src = root.join("in");
    let dst = root.join("out");
    fs::create_dir_all(&src).unwrap();
    let mut cfg = Config::new(&src, &dst);
    cfg.trash_dir = Some(root.join("trash"));
    cfg.copy_tool = CopyTool::Stream;
    cfg.retry_delay = Duration::ZERO;
    cfg.max_threads = 2;
    cfg
}

pub fn validated(mut cfg: Config) -> Config {
    cfg.validate_and_normalize().unwrap();
    cfg
}

/// Every regular file below `root`, relative and sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    out.sort();
    out
}
