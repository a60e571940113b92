//! Bounded worker pool.
//!
//! Each directory batch is fanned out over a fixed rayon pool and fully drained before
//! the reaper looks at that directory. Per-file errors are counted and collected; the
//! run carries on. Errors that make the whole run meaningless (invariant violations,
//! configuration) stop new work; the summary still comes back, with the cause in
//! `aborted`, so the counts of what already happened can be reported.
//!
//! Network mounts that drop out (ENOTCONN / EHOSTDOWN) get a sleeping back-off of
//! `min(60, 5 * attempt)` seconds, up to 12 attempts, before the file is given up on.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::scan::scan;
use super::{Engine, FileOutcome};
use crate::errors::SyncError;
use crate::shutdown;
use crate::stats::{Counter, StatsSnapshot};

const HOST_DOWN_ATTEMPTS: u32 = 12;
const HOST_DOWN_STEP: Duration = Duration::from_secs(5);
// The wait stops growing at 12 steps (60 s).
const HOST_DOWN_MAX_STEPS: u32 = 12;

/// Back-off before host-down retry number `attempt` (1-based).
pub(crate) fn host_down_delay(step: Duration, attempt: u32) -> Duration {
    step.saturating_mul(attempt.min(HOST_DOWN_MAX_STEPS))
}

/// A file the run gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

/// Result of a completed, interrupted or aborted run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub failures: Vec<FileFailure>,
    pub interrupted: bool,
    /// The error that stopped the run early. It is also listed in `failures`.
    pub aborted: Option<FileFailure>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.stats.errors > 0
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

pub struct WorkerPool {
    engine: Arc<Engine>,
    pool: rayon::ThreadPool,
    host_down_step: Duration,
}

impl WorkerPool {
    pub fn new(engine: Arc<Engine>) -> Result<Self, SyncError> {
        let threads = engine.config().max_threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mediasort-worker-{i}"))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to start worker pool: {e}")))?;
        Ok(Self {
            engine,
            pool,
            host_down_step: HOST_DOWN_STEP,
        })
    }

    /// Base unit of the host-down back-off (default 5 s).
    pub fn with_host_down_step(mut self, step: Duration) -> Self {
        self.host_down_step = step;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Organize everything under the configured source directory.
    ///
    /// Per-file failures are collected in the summary. A run stopped by a fatal error
    /// still returns its summary, with `aborted` set.
    pub fn organize(&self) -> Result<RunSummary, SyncError> {
        let cfg = self.engine.config();
        let root = cfg.source_dir.clone();
        let reap = cfg.cleanup && !cfg.copy_mode;

        let batches = scan(&root, self.engine.organizer());
        let total: usize = batches.iter().map(|b| b.files.len()).sum();
        info!(
            source = %root.display(),
            target = %cfg.target_root().display(),
            directories = batches.len(),
            files = total,
            threads = cfg.max_threads,
            organizer = self.engine.organizer().name(),
            dry_run = cfg.dry_run,
            "starting run"
        );

        let mut summary = RunSummary::default();
        let abort = AtomicBool::new(false);

        for batch in &batches {
            if shutdown::is_requested() {
                summary.interrupted = true;
                break;
            }

            let results: Vec<(&PathBuf, Option<Result<FileOutcome, SyncError>>)> =
                self.pool.install(|| {
                    batch
                        .files
                        .par_iter()
                        .map(|path| {
                            if abort.load(Ordering::Relaxed) {
                                return (path, None);
                            }
                            let res = self.process_with_backoff(path);
                            if let Err(e) = &res
                                && e.is_fatal_for_run()
                            {
                                abort.store(true, Ordering::Relaxed);
                            }
                            (path, Some(res))
                        })
                        .collect()
                });

            for (path, res) in results {
                match res {
                    None | Some(Ok(_)) => {}
                    Some(Err(SyncError::Interrupted)) => summary.interrupted = true,
                    Some(Err(e)) => {
                        let failure = self.record_failure(&mut summary, path, &e);
                        if e.is_fatal_for_run() && summary.aborted.is_none() {
                            error!(kind = e.kind(), code = e.code(), error = %e, "aborting run");
                            summary.aborted = Some(failure);
                        }
                    }
                }
            }
            if summary.is_aborted() || summary.interrupted {
                break;
            }

            if reap {
                self.reap(&batch.dir, &mut summary);
                if summary.is_aborted() {
                    break;
                }
            }
            debug!(dir = %batch.dir.display(), files = batch.files.len(), "directory done");
        }

        summary.stats = self.engine.stats().snapshot();
        if summary.interrupted {
            warn!("run interrupted; remaining files left in place");
        }
        info!(
            moved = summary.stats.files_moved,
            copied = summary.stats.files_copied,
            deleted = summary.stats.files_deleted,
            skipped = summary.stats.files_skipped,
            duplicates = summary.stats.duplicate_file,
            errors = summary.stats.errors,
            "run finished"
        );
        Ok(summary)
    }

    /// Only reap junk-only directories under the source; nothing is organized.
    pub fn cleanup(&self) -> Result<RunSummary, SyncError> {
        let root = &self.engine.config().source_dir;
        let reaped = self.engine.reaper().reap_tree(root)?;
        info!(root = %root.display(), removed = reaped.removed, kept = reaped.kept, "cleanup done");
        Ok(RunSummary {
            stats: self.engine.stats().snapshot(),
            ..RunSummary::default()
        })
    }

    fn process_with_backoff(&self, path: &Path) -> Result<FileOutcome, SyncError> {
        let mut attempt = 0;
        loop {
            match self.engine.process_file(path) {
                Err(e) if e.is_host_down() && attempt < HOST_DOWN_ATTEMPTS => {
                    attempt += 1;
                    let wait = host_down_delay(self.host_down_step, attempt);
                    warn!(
                        src = %path.display(),
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "storage host unreachable; waiting"
                    );
                    thread::sleep(wait);
                }
                other => return other,
            }
        }
    }

    fn record_failure(&self, summary: &mut RunSummary, path: &Path, e: &SyncError) -> FileFailure {
        self.engine.stats().record(Counter::Errors);
        error!(src = %path.display(), kind = e.kind(), code = e.code(), error = %e, "file failed");
        let failure = FileFailure {
            path: path.to_path_buf(),
            kind: e.kind(),
            message: e.to_string(),
        };
        summary.failures.push(failure.clone());
        failure
    }

    fn reap(&self, dir: &Path, summary: &mut RunSummary) {
        if let Err(e) = self.engine.reaper().reap_if_empty(dir) {
            let failure = self.record_failure(summary, dir, &e);
            if e.is_fatal_for_run() {
                error!(kind = e.kind(), code = e.code(), error = %e, "aborting run");
                summary.aborted = Some(failure);
            }
        }
    }
}
