//! Core library for `mediasort`.
//!
//! Migrates media files from a staging directory into a date-partitioned archive:
//! content hashing, collision resolution, checksum-verified move/copy, trash-based
//! deletion and cleanup of directories emptied by the migration, all driven by a
//! bounded worker pool.
//!
//! Layout:
//! - `config`: runtime settings, XML loading, default paths and validation.
//! - `fs_ops`: per-file primitives (hashing, collisions, transfers, trash, reaper).
//! - `engine`: the shared engine context, organizer strategies, scanning and the pool.
//! - `stats`: thread-safe run counters and the end-of-run report.
//! - `platform`: OS specifics hidden behind a uniform API.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs_ops;
pub mod output;
pub mod platform;
pub mod shutdown;
pub mod stats;

pub use config::{
    Action, Config, CopyTool, Layout, LogLevel, default_config_path, default_log_path,
    load_config_from_xml_path, path_has_symlink_ancestor,
};
pub use engine::{
    DateOrganizer, Engine, FileFailure, FileOutcome, FilenameDateOrganizer, Organizer,
    RunSummary, WorkerPool,
};
pub use errors::SyncError;
pub use fs_ops::{DestinationDecision, DirHandle, FileHandle};
pub use stats::{Counter, StatsRegistry, StatsSnapshot};
