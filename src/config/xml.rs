//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Writes a commented template on request (`--init-config`).
//!
//! Notes:
//! - This module only reads/writes the config file; directory validation happens elsewhere.
//! - Unknown XML fields are rejected so typos surface instead of being ignored.
//! - Values are trimmed before parsing; empty elements mean "use the default".

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::paths::{default_config_path, path_has_symlink_ancestor};
use super::types::{Config, CopyTool, Layout, LogLevel};
use super::{CONFIG_ENV, DEFAULT_EXTENSIONS};
use crate::platform::{set_dir_mode_0700, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    source_dir: Option<String>,
    target_dir: Option<String>,
    trash_dir: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    dry_run: Option<String>,
    skip_hash: Option<String>,
    skip_mtime_compare: Option<String>,
    skip_collision: Option<String>,
    keep_duplicates: Option<String>,
    copy_mode: Option<String>,
    max_threads: Option<String>,
    /// Comma or whitespace separated list, e.g. "jpg, mp4, heic"
    extensions: Option<String>,
    layout: Option<String>,
    copy_tool: Option<String>,
    max_collision_attempts: Option<String>,
    copy_retries: Option<String>,
    retry_delay_seconds: Option<String>,
    hash_cache_capacity: Option<String>,
    stat_cache_capacity: Option<String>,
    cleanup: Option<String>,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `$MEDIASORT_CONFIG` named this file.
    Explicit(PathBuf),
    /// The platform default location held a config file.
    DefaultFile(PathBuf),
    /// No file; built-in defaults.
    Builtin,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bool(field: &str, v: &Option<String>) -> Result<Option<bool>> {
    let Some(s) = non_empty(v) else {
        return Ok(None);
    };
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(Some(true)),
        "false" | "no" | "0" | "off" => Ok(Some(false)),
        other => bail!("<{field}> expects true/false, got '{other}'"),
    }
}

fn parse_num<T: std::str::FromStr>(field: &str, v: &Option<String>) -> Result<Option<T>> {
    let Some(s) = non_empty(v) else {
        return Ok(None);
    };
    s.parse::<T>()
        .map(Some)
        .map_err(|_| anyhow!("<{field}> expects a non-negative integer, got '{s}'"))
}

/// Split "jpg, .PNG  mp4" into ["jpg", "png", "mp4"].
pub(crate) fn parse_extensions(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

// Map XmlConfig -> Config on top of the defaults.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = non_empty(&parsed.source_dir) {
        cfg.source_dir = PathBuf::from(s);
    }
    cfg.target_dir = non_empty(&parsed.target_dir).map(PathBuf::from);
    cfg.trash_dir = non_empty(&parsed.trash_dir).map(PathBuf::from);
    cfg.log_file = non_empty(&parsed.log_file).map(PathBuf::from);

    if let Some(s) = non_empty(&parsed.log_level) {
        cfg.log_level = s.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(&parsed.layout) {
        cfg.layout = s.parse::<Layout>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(&parsed.copy_tool) {
        cfg.copy_tool = s.parse::<CopyTool>().map_err(|e| anyhow!(e))?;
    }
    if let Some(s) = non_empty(&parsed.extensions) {
        cfg.extensions = parse_extensions(s);
        if cfg.extensions.is_empty() {
            cfg.extensions = DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect();
        }
    }

    if let Some(b) = parse_bool("dry_run", &parsed.dry_run)? {
        cfg.dry_run = b;
    }
    if let Some(b) = parse_bool("skip_hash", &parsed.skip_hash)? {
        cfg.skip_hash = b;
    }
    if let Some(b) = parse_bool("skip_mtime_compare", &parsed.skip_mtime_compare)? {
        cfg.skip_mtime_compare = b;
    }
    if let Some(b) = parse_bool("skip_collision", &parsed.skip_collision)? {
        cfg.skip_collision = b;
    }
    if let Some(b) = parse_bool("keep_duplicates", &parsed.keep_duplicates)? {
        cfg.keep_duplicates = b;
    }
    if let Some(b) = parse_bool("copy_mode", &parsed.copy_mode)? {
        cfg.copy_mode = b;
    }
    if let Some(b) = parse_bool("cleanup", &parsed.cleanup)? {
        cfg.cleanup = b;
    }

    if let Some(n) = parse_num::<usize>("max_threads", &parsed.max_threads)? {
        cfg.max_threads = n;
    }
    if let Some(n) = parse_num::<u32>("max_collision_attempts", &parsed.max_collision_attempts)? {
        cfg.max_collision_attempts = n;
    }
    if let Some(n) = parse_num::<u32>("copy_retries", &parsed.copy_retries)? {
        cfg.copy_retries = n;
    }
    if let Some(n) = parse_num::<u64>("retry_delay_seconds", &parsed.retry_delay_seconds)? {
        cfg.retry_delay = Duration::from_secs(n);
    }
    if let Some(n) = parse_num::<usize>("hash_cache_capacity", &parsed.hash_cache_capacity)? {
        cfg.hash_cache_capacity = n;
    }
    if let Some(n) = parse_num::<usize>("stat_cache_capacity", &parsed.stat_cache_capacity)? {
        cfg.stat_cache_capacity = n;
    }

    Ok(cfg)
}

/// Load a Config from a specific XML file path (quick_xml).
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Resolve and load the effective config file.
/// - `$MEDIASORT_CONFIG` set: that file must exist and parse.
/// - otherwise the platform default is used when present, else built-in defaults.
pub fn load_config() -> Result<(Config, ConfigSource)> {
    let explicit = env::var_os(CONFIG_ENV).is_some();
    let path = default_config_path()?;
    if explicit {
        if !path.exists() {
            bail!(
                "{CONFIG_ENV} points to '{}' which does not exist",
                path.display()
            );
        }
        let cfg = load_config_from_xml_path(&path)?;
        return Ok((cfg, ConfigSource::Explicit(path)));
    }
    if path.exists() {
        let cfg = load_config_from_xml_path(&path)?;
        return Ok((cfg, ConfigSource::DefaultFile(path)));
    }
    Ok((Config::default(), ConfigSource::Builtin))
}

/// Write a commented template config (0600, atomic). Refuses to overwrite or to write
/// below a symlinked ancestor.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let content = format!(
        "<!--\n  mediasort configuration (XML)\n\n  Paths:\n    source_dir             -> staging directory to organize\n    target_dir             -> archive root (defaults to source_dir)\n    trash_dir              -> override for <drive-root>/.trash\n    log_file               -> optional log file (stdout is always used)\n\n  Flags (true/false):\n    dry_run                -> log what would happen, change nothing\n    skip_hash              -> compare size/mtime only; never deletes\n    skip_mtime_compare     -> ignore mtime when comparing candidates\n    skip_collision         -> skip files whose destination is taken\n    keep_duplicates        -> keep sources that duplicate the archive\n    copy_mode              -> copy instead of move\n    cleanup                -> remove directories left holding only junk\n\n  Tuning:\n    log_level              -> quiet | normal | info | debug\n    layout                 -> modified | filename\n    copy_tool              -> auto | rsync | stream\n    extensions             -> comma separated list\n    max_threads, max_collision_attempts, copy_retries, retry_delay_seconds,\n    hash_cache_capacity, stat_cache_capacity\n\n  CLI flags override XML values.\n-->\n<config>\n  <source_dir></source_dir>\n  <target_dir></target_dir>\n  <log_level>normal</log_level>\n  <layout>modified</layout>\n  <copy_tool>auto</copy_tool>\n  <extensions>{}</extensions>\n  <max_threads>{}</max_threads>\n  <cleanup>true</cleanup>\n</config>\n",
        DEFAULT_EXTENSIONS.join(", "),
        super::default_threads(),
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    info!(path = %path.display(), "Created template config");
    Ok(())
}
