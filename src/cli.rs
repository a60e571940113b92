//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Flags override the XML config; `MEDIASORT_TARGET` / `MEDIASORT_TRASH` sit between
//!   the two (clap reads them as flag fallbacks).
//! - -v/--verbose is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::{Action, Config, CopyTool, Layout, LogLevel};

/// Organize a media staging directory into a dated archive.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Move media into a YYYY/YYYY-MM-DD archive with verified copies, duplicate detection and a trash instead of deletes"
)]
pub struct Args {
    /// Staging directory to scan.
    #[arg(short = 'd', long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub directory: Option<PathBuf>,

    /// Archive root (defaults to the staging directory itself).
    #[arg(short = 't', long, env = "MEDIASORT_TARGET", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub target: Option<PathBuf>,

    /// Trash directory (defaults to `<drive root>/.trash`).
    #[arg(long, env = "MEDIASORT_TRASH", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub trash: Option<PathBuf>,

    /// Copy files instead of moving them; sources are never deleted.
    #[arg(short = 'c', long)]
    pub copy: bool,

    /// Leave sources in place when they duplicate archived content.
    #[arg(short = 'k', long)]
    pub keep_duplicates: bool,

    /// Skip files whose destination is already taken.
    #[arg(long)]
    pub skip_collision: bool,

    /// Compare size and mtime only; implies no deletions.
    #[arg(long)]
    pub skip_hash: bool,

    /// Ignore modification time differences when comparing files.
    #[arg(long)]
    pub skip_mtime_compare: bool,

    /// Show what would be done, but do not modify files/directories.
    #[arg(long)]
    pub dry_run: bool,

    /// Worker threads (default: half the cores, 1..=4).
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    #[arg(long, value_enum)]
    pub action: Option<Action>,

    /// How the dated subdirectory is derived.
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Extension to pick up (repeatable); replaces the configured list.
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    #[arg(long, value_enum)]
    pub copy_tool: Option<CopyTool>,

    /// Do not remove directories emptied by the run.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Also write logs to this file.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long)]
    pub json: bool,

    /// Print the config file location used by mediasort and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Write a commented template config file (if none exists) and exit.
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --verbose > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.verbose {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Action requested on the command line, organize when unset.
    pub fn action(&self) -> Action {
        self.action.unwrap_or_default()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(dir) = &self.directory {
            cfg.source_dir = dir.clone();
        }
        if let Some(target) = &self.target {
            cfg.target_dir = Some(target.clone());
        }
        if let Some(trash) = &self.trash {
            cfg.trash_dir = Some(trash.clone());
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(file) = &self.log_file {
            cfg.log_file = Some(file.clone());
        }
        if let Some(n) = self.threads {
            cfg.max_threads = n;
        }
        if let Some(layout) = self.layout {
            cfg.layout = layout;
        }
        if let Some(tool) = self.copy_tool {
            cfg.copy_tool = tool;
        }
        if !self.extensions.is_empty() {
            cfg.extensions = crate::config::xml::parse_extensions(&self.extensions.join(","));
        }
        cfg.copy_mode |= self.copy;
        cfg.keep_duplicates |= self.keep_duplicates;
        cfg.skip_collision |= self.skip_collision;
        cfg.skip_hash |= self.skip_hash;
        cfg.skip_mtime_compare |= self.skip_mtime_compare;
        cfg.dry_run |= self.dry_run;
        if self.no_cleanup {
            cfg.cleanup = false;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
