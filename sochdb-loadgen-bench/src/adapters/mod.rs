//! Backend adapters.
//!
//! Each backend is a cheap, cloneable factory implementing
//! [`sochdb_loadgen::Backend`] for every item type. Every handle it creates
//! lives in its own temporary directory under the backend's root, removed
//! when the handle is dropped.

pub mod event_store;
pub mod file_log;
pub mod memory_store;
pub mod sqlite_store;

use std::path::Path;

use sochdb_loadgen::BackendError;
use tempfile::TempDir;

pub use event_store::EventStoreBackend;
pub use file_log::FileLogBackend;
pub use memory_store::MemoryBackend;
pub use sqlite_store::SqliteBackend;

/// Fresh per-handle directory under `root`.
pub(crate) fn handle_dir(root: &Path, prefix: &str) -> Result<TempDir, BackendError> {
    std::fs::create_dir_all(root)
        .map_err(|e| BackendError::CreateFailed(format!("create {}: {}", root.display(), e)))?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(root)
        .map_err(|e| BackendError::CreateFailed(format!("{} dir: {}", prefix, e)))
}
