//! Organizer strategies: which files a run picks up and which dated subdirectory each
//! one lands in. The engine is parameterised by one of these instead of subclassing
//! per layout.

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::{Config, Layout};
use crate::fs_ops::{FileHandle, FileStat};

pub trait Organizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the scanner should hand this file to the pool.
    fn matches(&self, path: &Path) -> bool;

    /// Subdirectory below the target root, e.g. `2024/2024-03-15`.
    fn subdirectory(&self, file: &FileHandle, stat: &FileStat) -> PathBuf;
}

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone)]
struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }
}

fn date_dir(date: NaiveDate) -> PathBuf {
    PathBuf::from(date.format("%Y").to_string()).join(date.format("%Y-%m-%d").to_string())
}

fn modified_date(stat: &FileStat) -> NaiveDate {
    DateTime::<Local>::from(stat.modified).date_naive()
}

/// `YYYY/YYYY-MM-DD` from the modification time, in local time.
#[derive(Debug, Clone)]
pub struct DateOrganizer {
    filter: ExtensionFilter,
}

impl DateOrganizer {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            filter: ExtensionFilter::new(extensions),
        }
    }
}

impl Organizer for DateOrganizer {
    fn name(&self) -> &'static str {
        "modified"
    }

    fn matches(&self, path: &Path) -> bool {
        self.filter.matches(path)
    }

    fn subdirectory(&self, _file: &FileHandle, stat: &FileStat) -> PathBuf {
        date_dir(modified_date(stat))
    }
}

/// Prefers a date embedded in the file name (`IMG_20240315_120000.jpg`,
/// `PXL_2024-03-15.jpg`, `2024_03_15.mp4`), falling back to the modification time.
#[derive(Debug, Clone)]
pub struct FilenameDateOrganizer {
    filter: ExtensionFilter,
}

impl FilenameDateOrganizer {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            filter: ExtensionFilter::new(extensions),
        }
    }
}

fn filename_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(20[0-2]\d)([-_]?)(\d{2})([-_]?)(\d{2})").ok())
        .as_ref()
}

/// First plausible calendar date in `name`. Digits must not run into the match on
/// either side and both separators must agree.
pub(crate) fn date_from_filename(name: &str) -> Option<NaiveDate> {
    let re = filename_date_re()?;
    let bytes = name.as_bytes();
    for caps in re.captures_iter(name) {
        let whole = caps.get(0)?;
        let before = whole.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(whole.end()).copied();
        if before.is_some_and(|b| b.is_ascii_digit()) || after.is_some_and(|b| b.is_ascii_digit()) {
            continue;
        }
        if caps[2] != caps[4] {
            continue;
        }
        let (Ok(y), Ok(m), Ok(d)) = (
            caps[1].parse::<i32>(),
            caps[3].parse::<u32>(),
            caps[5].parse::<u32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }
    None
}

impl Organizer for FilenameDateOrganizer {
    fn name(&self) -> &'static str {
        "filename"
    }

    fn matches(&self, path: &Path) -> bool {
        self.filter.matches(path)
    }

    fn subdirectory(&self, file: &FileHandle, stat: &FileStat) -> PathBuf {
        let name = file.file_name().to_string_lossy();
        date_dir(date_from_filename(&name).unwrap_or_else(|| modified_date(stat)))
    }
}

/// Organizer for the configured layout.
pub fn organizer_for(cfg: &Config) -> Arc<dyn Organizer> {
    match cfg.layout {
        Layout::Modified => Arc::new(DateOrganizer::new(&cfg.extensions)),
        Layout::Filename => Arc::new(FilenameDateOrganizer::new(&cfg.extensions)),
    }
}
