//! Filesystem operations: modularized.
//!
//! Leaf helpers (naming, hashing, stat cache, atomic rename, metadata) feed the three
//! components that mutate the tree: `collision` decides where a file goes, `transfer`
//! moves or copies it with verification, `trash` and `reaper` clean up behind it.

mod atomic;
pub mod collision;
pub mod copier;
pub mod drive;
pub mod handle;
pub mod hash;
pub(crate) mod helpers;
mod io_copy;
pub mod junk;
mod meta;
pub mod naming;
pub mod reaper;
pub mod stat;
pub mod transfer;
pub mod trash;
mod util;

pub use collision::{CollisionPolicy, CollisionResolver, DestinationDecision};
pub use copier::{CopyPrimitive, RsyncCopy, StreamCopy, copy_timeout, select_copier};
pub use drive::guess_drive_root;
pub use handle::{DirHandle, FileHandle, SIDECAR_EXTENSION, sidecar_path};
pub use hash::{Digest, HashCache, HashMode};
pub use reaper::{DirectoryReaper, ReapSummary};
pub use stat::{FileStat, FileStatCache};
pub use transfer::TransferExecutor;
pub use trash::{SHARD_SIZE, TRASH_DIR_NAME, TrashManager};
