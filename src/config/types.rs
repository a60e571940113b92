//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel, Action, Layout and CopyTool are small enums with string parsing helpers
//!   shared by the XML loader and the CLI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::{
    COPY_RETRIES_DEFAULT, DEFAULT_EXTENSIONS, HASH_CACHE_CAPACITY, MAX_COLLISION_ATTEMPTS,
    RETRY_DELAY_DEFAULT, STAT_CACHE_CAPACITY,
};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// What a run does with the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Action {
    /// Route every matching file into the dated archive layout.
    #[default]
    Organize,
    /// Only remove directories that hold nothing but junk.
    Cleanup,
}

/// How a file's archive subdirectory is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Layout {
    /// `YYYY/YYYY-MM-DD` from the modification time.
    #[default]
    Modified,
    /// Date embedded in the filename, falling back to the modification time.
    Filename,
}

impl FromStr for Layout {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modified" | "mtime" => Ok(Layout::Modified),
            "filename" | "name" => Ok(Layout::Filename),
            other => Err(format!("invalid layout: '{other}'")),
        }
    }
}

/// External copy primitive selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CopyTool {
    /// rsync when it is on PATH, otherwise the in-process stream copy.
    #[default]
    Auto,
    Rsync,
    Stream,
}

impl FromStr for CopyTool {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CopyTool::Auto),
            "rsync" => Ok(CopyTool::Rsync),
            "stream" | "builtin" => Ok(CopyTool::Stream),
            other => Err(format!("invalid copy tool: '{other}'")),
        }
    }
}

/// Runtime configuration used by the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Staging directory scanned for media
    pub source_dir: PathBuf,
    /// Archive root; the source directory itself when unset
    pub target_dir: Option<PathBuf>,
    /// Override for `<drive-root>/.trash`
    pub trash_dir: Option<PathBuf>,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Log every mutation but perform none
    pub dry_run: bool,
    /// Trust size (+ mtime) only; never hash, never delete
    pub skip_hash: bool,
    /// Ignore mtime drift when comparing candidates
    pub skip_mtime_compare: bool,
    /// Skip any file whose destination is occupied
    pub skip_collision: bool,
    /// Leave the source in place when it duplicates the destination
    pub keep_duplicates: bool,
    /// Copy instead of move; sources are never deleted
    pub copy_mode: bool,
    /// Worker pool size
    pub max_threads: usize,
    /// Lower-case extensions (without dot) the organizer picks up
    pub extensions: Vec<String>,
    pub layout: Layout,
    pub copy_tool: CopyTool,
    /// Bound on `<stem>_<i>` candidates per file
    pub max_collision_attempts: u32,
    /// Copy retries after the first attempt
    pub copy_retries: u32,
    /// Pause between copy attempts
    pub retry_delay: Duration,
    pub hash_cache_capacity: usize,
    pub stat_cache_capacity: usize,
    /// Reap emptied directories after each batch
    pub cleanup: bool,
}

/// Half the available cores, clamped to 1..=4.
pub fn default_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus as f64 / 2.0).round().clamp(1.0, 4.0) as usize
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            target_dir: None,
            trash_dir: None,
            log_level: LogLevel::Normal,
            log_file: None,
            dry_run: false,
            skip_hash: false,
            skip_mtime_compare: false,
            skip_collision: false,
            keep_duplicates: false,
            copy_mode: false,
            max_threads: default_threads(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            layout: Layout::Modified,
            copy_tool: CopyTool::Auto,
            max_collision_attempts: MAX_COLLISION_ATTEMPTS,
            copy_retries: COPY_RETRIES_DEFAULT,
            retry_delay: RETRY_DELAY_DEFAULT,
            hash_cache_capacity: HASH_CACHE_CAPACITY,
            stat_cache_capacity: STAT_CACHE_CAPACITY,
            cleanup: true,
        }
    }
}

impl Config {
    /// Construct a Config for a source/target pair; other fields use defaults.
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: Some(target_dir.into()),
            ..Default::default()
        }
    }

    /// Archive root actually used for routing.
    pub fn target_root(&self) -> &Path {
        self.target_dir.as_deref().unwrap_or(&self.source_dir)
    }

    /// Whether the engine may delete anything through the trash.
    /// Unverified content (`skip_hash`) and copy mode never delete.
    pub fn deletions_allowed(&self) -> bool {
        !self.skip_hash && !self.copy_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threads_is_clamped() {
        let n = default_threads();
        assert!((1..=4).contains(&n), "got {n}");
    }

    #[test]
    fn target_defaults_to_source() {
        let mut cfg = Config::default();
        cfg.source_dir = PathBuf::from("/data/incoming");
        assert_eq!(cfg.target_root(), Path::new("/data/incoming"));
        cfg.target_dir = Some(PathBuf::from("/data/archive"));
        assert_eq!(cfg.target_root(), Path::new("/data/archive"));
    }

    #[test]
    fn parse_helpers_accept_aliases() {
        assert_eq!(LogLevel::parse("VERBOSE"), Some(LogLevel::Info));
        assert_eq!("mtime".parse::<Layout>(), Ok(Layout::Modified));
        assert_eq!(" builtin ".parse::<CopyTool>(), Ok(CopyTool::Stream));
        assert!("zip".parse::<CopyTool>().is_err());
    }

    #[test]
    fn deletions_blocked_by_copy_or_skip_hash() {
        let mut cfg = Config::default();
        assert!(cfg.deletions_allowed());
        cfg.copy_mode = true;
        assert!(!cfg.deletions_allowed());
        cfg.copy_mode = false;
        cfg.skip_hash = true;
        assert!(!cfg.deletions_allowed());
    }
}
