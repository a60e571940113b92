//! Config validation logic.
//! Verifies directory existence, readability/writability and numeric bounds, and
//! canonicalizes the source/target/trash paths so the engine only sees absolute paths.

use anyhow::{Context, Result, bail};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::fs_ops::helpers::io_error_with_help;
use crate::fs_ops::trash::TRASH_DIR_NAME;
use crate::platform::tmp_sibling_name;

use super::types::Config;

impl Config {
    /// Validate paths and limits, creating the target (and an explicit trash dir) if missing.
    /// On success every configured directory is absolute and canonical.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        if self.max_threads == 0 {
            bail!("max_threads must be at least 1");
        }
        if self.max_collision_attempts == 0 {
            bail!("max_collision_attempts must be at least 1");
        }
        if self.hash_cache_capacity == 0 || self.stat_cache_capacity == 0 {
            bail!("cache capacities must be at least 1");
        }
        if self.extensions.is_empty() {
            bail!("at least one file extension must be configured");
        }

        // 1) Source: must exist, be a directory, and be readable.
        ensure_dir_exists_and_is_dir(&self.source_dir, "source_dir")?;
        ensure_readable(&self.source_dir, "source_dir")?;
        self.source_dir = canonical(&self.source_dir, "source_dir")?;

        // 2) Target: create if missing; must be writable unless nothing will be written.
        if let Some(target) = self.target_dir.clone() {
            if self.dry_run {
                if target.exists() && !target.is_dir() {
                    bail!("target_dir exists but isn't a directory: {}", target.display());
                }
            } else {
                ensure_dir_is_or_create(&target, "target_dir")?;
                ensure_writable(&target, "target_dir")?;
            }
            if target.exists() {
                self.target_dir = Some(canonical(&target, "target_dir")?);
            } else {
                self.target_dir = Some(std::path::absolute(&target).unwrap_or(target));
            }
        }
        if self
            .target_root()
            .components()
            .any(|c| c.as_os_str() == TRASH_DIR_NAME)
        {
            bail!(
                "target '{}' must not live inside a {TRASH_DIR_NAME} directory",
                self.target_root().display()
            );
        }

        // 3) Trash override: must be a directory (or creatable) and writable.
        if let Some(trash) = self.trash_dir.clone() {
            if !self.dry_run {
                ensure_dir_is_or_create(&trash, "trash_dir")?;
                ensure_writable(&trash, "trash_dir")?;
                self.trash_dir = Some(canonical(&trash, "trash_dir")?);
            } else if trash.exists() && !trash.is_dir() {
                bail!("trash_dir exists but isn't a directory: {}", trash.display());
            }
        }

        info!(
            source = %self.source_dir.display(),
            target = %self.target_root().display(),
            trash = %self
                .trash_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<drive root>".into()),
            threads = self.max_threads,
            "Config validated"
        );
        Ok(())
    }
}

fn canonical(path: &Path, name: &str) -> Result<PathBuf> {
    dunce::canonicalize(path)
        .with_context(|| format!("Failed to resolve {name} '{}'", path.display()))
}

/// Ensure path exists and is a directory; emit clear errors with path context.
fn ensure_dir_exists_and_is_dir(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        error!("{name} does not exist: {}", path.display());
        bail!("{name} does not exist: {}", path.display());
    }
    if !path.is_dir() {
        error!("{name} is not a directory: {}", path.display());
        bail!("{name} is not a directory: {}", path.display());
    }
    Ok(())
}

/// Ensure directory is readable by attempting to open its entries.
fn ensure_readable(path: &Path, name: &str) -> Result<()> {
    fs::read_dir(path).with_context(|| {
        format!("Cannot read {name} directory '{}'; check permissions", path.display())
    })?;
    debug!("{name} readable: {}", path.display());
    Ok(())
}

/// Ensure directory exists (create if missing). If exists, it must be a directory.
fn ensure_dir_is_or_create(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            error!("{name} exists but isn't a directory: {}", path.display());
            bail!("{name} exists but isn't a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path).map_err(io_error_with_help("create directory", path))?;
        info!("Created {name} directory: {}", path.display());
    }
    Ok(())
}

/// Ensure directory is writable using a short-lived probe file.
fn ensure_writable(path: &Path, name: &str) -> Result<()> {
    let probe = tmp_sibling_name(&path.join("probe"), "probe");
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .with_context(|| format!("Cannot write to {name} '{}'; check permissions", path.display()))?;
    let _ = fs::remove_file(&probe);
    debug!("{name} writable: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_target_and_canonicalizes() {
        let td = tempdir().unwrap();
        let src = td.path().join("in");
        fs::create_dir(&src).unwrap();
        let mut cfg = Config::new(&src, td.path().join("out"));
        cfg.validate_and_normalize().unwrap();
        assert!(td.path().join("out").is_dir());
        assert!(cfg.source_dir.is_absolute());
        assert!(cfg.target_root().is_absolute());
    }

    #[test]
    fn missing_source_is_rejected() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path().join("absent"), td.path());
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn trash_that_is_a_file_aborts() {
        let td = tempdir().unwrap();
        let file = td.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let mut cfg = Config::new(td.path(), td.path());
        cfg.trash_dir = Some(file);
        let err = cfg.validate_and_normalize().unwrap_err().to_string();
        assert!(err.contains("trash_dir"), "{err}");
    }

    #[test]
    fn zero_threads_is_rejected() {
        let td = tempdir().unwrap();
        let mut cfg = Config::new(td.path(), td.path());
        cfg.max_threads = 0;
        assert!(cfg.validate_and_normalize().is_err());
    }
}
