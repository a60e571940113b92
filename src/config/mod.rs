//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

use std::time::Duration;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Action, Config, CopyTool, Layout, LogLevel, default_threads};
pub use xml::{create_template_config, load_config, load_config_from_xml_path};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MEDIASORT_CONFIG";

/// Extensions picked up by the default organizer.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "webp", "png", "heic", "dng", "arw", "nef", "psd", "tif", "tiff", "mp4",
    "avi", "mov", "mkv", "3gp",
];

pub const MAX_COLLISION_ATTEMPTS: u32 = 1000;
pub const COPY_RETRIES_DEFAULT: u32 = 3;
pub const RETRY_DELAY_DEFAULT: Duration = Duration::from_secs(5);
pub const HASH_CACHE_CAPACITY: usize = 10_000;
pub const STAT_CACHE_CAPACITY: usize = 1024;
