//! The engine context and the per-file pipeline.
//!
//! One `Engine` per run owns the caches, the counters and every component. Components
//! share the caches and counters through `Arc`s; nothing here is global, so two engines
//! in one process (as in tests) do not see each other's state.

mod organizer;
mod pool;
mod scan;

pub use organizer::{DateOrganizer, FilenameDateOrganizer, Organizer, organizer_for};
pub use pool::{FileFailure, RunSummary, WorkerPool};
pub use scan::{DirectoryBatch, scan};
pub use crate::stats::{Counter, StatsRegistry, StatsSnapshot};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::errors::SyncError;
use crate::fs_ops::{
    CollisionPolicy, CollisionResolver, CopyPrimitive, DestinationDecision, DirectoryReaper,
    FileHandle, FileStatCache, HashCache, TransferExecutor, TrashManager, select_copier,
};
use crate::shutdown;

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Moved or copied to this path.
    Transferred(PathBuf),
    /// Already sitting at its destination.
    InPlace,
    /// Identical content already archived.
    Duplicate { removed_source: bool },
    /// Destination occupied under the skip-on-collision policy.
    Skipped,
}

pub struct Engine {
    config: Config,
    organizer: Arc<dyn Organizer>,
    stats: Arc<StatsRegistry>,
    stat_cache: Arc<FileStatCache>,
    trash: Arc<TrashManager>,
    resolver: CollisionResolver,
    executor: TransferExecutor,
    reaper: DirectoryReaper,
}

impl Engine {
    /// Engine using the copy tool named in the configuration.
    pub fn new(cfg: &Config) -> Result<Self, SyncError> {
        Self::with_copier(cfg, select_copier(cfg.copy_tool))
    }

    /// Engine with an explicit copy primitive.
    pub fn with_copier(cfg: &Config, copier: Arc<dyn CopyPrimitive>) -> Result<Self, SyncError> {
        if cfg.max_threads == 0 {
            return Err(SyncError::Config("max_threads must be at least 1".into()));
        }
        if cfg.max_collision_attempts == 0 {
            return Err(SyncError::Config("max_collision_attempts must be at least 1".into()));
        }

        let stats = Arc::new(StatsRegistry::new());
        let hashes = Arc::new(HashCache::new(cfg.hash_cache_capacity));
        let stat_cache = Arc::new(FileStatCache::new(cfg.stat_cache_capacity));
        let trash = Arc::new(TrashManager::from_config(cfg, Arc::clone(&stats)));

        if let Ok(meta) = fs::metadata(trash.root())
            && !meta.is_dir()
        {
            return Err(SyncError::Config(format!(
                "trash root {} is not a directory",
                trash.root().display()
            )));
        }

        let resolver = CollisionResolver::new(
            CollisionPolicy::from_config(cfg),
            Arc::clone(&hashes),
            Arc::clone(&stat_cache),
            Arc::clone(&trash),
            Arc::clone(&stats),
        );
        let executor = TransferExecutor::new(
            cfg,
            Arc::clone(&copier),
            Arc::clone(&hashes),
            Arc::clone(&stat_cache),
            Arc::clone(&trash),
            Arc::clone(&stats),
        );
        let reaper = DirectoryReaper::new(Arc::clone(&trash), Arc::clone(&stats), cfg.dry_run)
            .protect(cfg.source_dir.clone())
            .protect(cfg.target_root().to_path_buf());

        debug!(
            copier = copier.name(),
            layout = ?cfg.layout,
            trash = %trash.root().display(),
            threads = cfg.max_threads,
            "engine ready"
        );

        Ok(Self {
            organizer: organizer_for(cfg),
            config: cfg.clone(),
            stats,
            stat_cache,
            trash,
            resolver,
            executor,
            reaper,
        })
    }

    /// Replace the organizer chosen from the configured layout.
    pub fn with_organizer(mut self, organizer: Arc<dyn Organizer>) -> Self {
        self.organizer = organizer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn organizer(&self) -> &dyn Organizer {
        self.organizer.as_ref()
    }

    pub fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    pub fn trash(&self) -> &TrashManager {
        &self.trash
    }

    pub fn resolver(&self) -> &CollisionResolver {
        &self.resolver
    }

    pub fn executor(&self) -> &TransferExecutor {
        &self.executor
    }

    pub fn reaper(&self) -> &DirectoryReaper {
        &self.reaper
    }

    /// `target/<subdirectory>/<file name>` for `file`.
    pub fn destination_for(&self, file: &FileHandle) -> Result<PathBuf, SyncError> {
        let stat = self.stat_cache.stat(file.path())?;
        let subdir = self.organizer.subdirectory(file, &stat);
        Ok(self.config.target_root().join(subdir).join(file.file_name()))
    }

    /// Classify, resolve and transfer one file.
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome, SyncError> {
        if shutdown::is_requested() {
            return Err(SyncError::Interrupted);
        }

        let file = FileHandle::new(path)?;
        let desired = self.destination_for(&file)?;

        if fs::symlink_metadata(&desired).is_ok() && self.stat_cache.same_file(file.path(), &desired)? {
            debug!(src = %path.display(), "already in place");
            self.stats.record(Counter::FilesSkipped);
            return Ok(FileOutcome::InPlace);
        }

        match self.resolver.resolve(&file, &desired)? {
            DestinationDecision::Accepted(dest) => {
                let dest = if self.config.copy_mode {
                    self.executor.copy_file(&file, &dest)?
                } else {
                    self.executor.move_file(&file, &dest)?
                };
                Ok(FileOutcome::Transferred(dest))
            }
            DestinationDecision::DuplicateHandled { removed_source } => {
                Ok(FileOutcome::Duplicate { removed_source })
            }
            DestinationDecision::Rejected => Ok(FileOutcome::Skipped),
            DestinationDecision::ExhaustedAttempts { last } => Err(SyncError::ExhaustedAttempts {
                src: file.into_path(),
                last,
                attempts: self.config.max_collision_attempts,
            }),
        }
    }
}
