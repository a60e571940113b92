//! Run counters.
//!
//! One mutex guards the whole counter family. Each increment or snapshot is a single
//! short critical section, so readers never stall writers for longer than one update.
//! A registry lives as long as its engine; there is no global state.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    FilesMoved,
    FilesCopied,
    FilesDeleted,
    FilesSkipped,
    DuplicateFile,
    Errors,
    DirectoriesCreated,
    DirectoriesDeleted,
}

impl Counter {
    pub const ALL: [Counter; 8] = [
        Counter::FilesMoved,
        Counter::FilesCopied,
        Counter::FilesDeleted,
        Counter::FilesSkipped,
        Counter::DuplicateFile,
        Counter::Errors,
        Counter::DirectoriesCreated,
        Counter::DirectoriesDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Counter::FilesMoved => "files_moved",
            Counter::FilesCopied => "files_copied",
            Counter::FilesDeleted => "files_deleted",
            Counter::FilesSkipped => "files_skipped",
            Counter::DuplicateFile => "duplicate_file",
            Counter::Errors => "errors",
            Counter::DirectoriesCreated => "directories_created",
            Counter::DirectoriesDeleted => "directories_deleted",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct StatsRegistry {
    counts: Mutex<[u64; 8]>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts[counter.index()] = counts[counter.index()].saturating_add(n);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts[counter.index()]
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = *self.counts.lock().unwrap_or_else(|p| p.into_inner());
        StatsSnapshot {
            files_moved: c[Counter::FilesMoved.index()],
            files_copied: c[Counter::FilesCopied.index()],
            files_deleted: c[Counter::FilesDeleted.index()],
            files_skipped: c[Counter::FilesSkipped.index()],
            duplicate_file: c[Counter::DuplicateFile.index()],
            errors: c[Counter::Errors.index()],
            directories_created: c[Counter::DirectoriesCreated.index()],
            directories_deleted: c[Counter::DirectoriesDeleted.index()],
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub files_moved: u64,
    pub files_copied: u64,
    pub files_deleted: u64,
    pub files_skipped: u64,
    pub duplicate_file: u64,
    pub errors: u64,
    pub directories_created: u64,
    pub directories_deleted: u64,
}

impl StatsSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == StatsSnapshot::default()
    }

    /// One-line human summary, e.g.
    /// `Files: 3 moved, 0 copied, 1 deleted, 0 skipped, 1 duplicates | Directories: 2 created, 1 removed`.
    pub fn report(&self) -> String {
        if self.is_empty() {
            return "No files changed".to_string();
        }
        let mut parts = Vec::new();
        let files = self.files_moved
            + self.files_copied
            + self.files_deleted
            + self.files_skipped
            + self.duplicate_file;
        if files > 0 {
            parts.push(format!(
                "Files: {} moved, {} copied, {} deleted, {} skipped, {} duplicates",
                self.files_moved,
                self.files_copied,
                self.files_deleted,
                self.files_skipped,
                self.duplicate_file
            ));
        }
        if self.directories_created + self.directories_deleted > 0 {
            parts.push(format!(
                "Directories: {} created, {} removed",
                self.directories_created, self.directories_deleted
            ));
        }
        if self.errors > 0 {
            parts.push(format!("Errors: {}", self.errors));
        }
        parts.join(" | ")
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}
