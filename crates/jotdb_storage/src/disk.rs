//! Disk-based file system for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::fs::FileSystem;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// A file system backed by the OS file APIs.
///
/// Data survives process restarts. Each append opens the file in append
/// mode, writes, and closes it, so a single instance can serve any number
/// of paths concurrently without holding descriptors open.
///
/// # Durability
///
/// - `append` with `sync = true` calls `File::sync_all()` before returning
/// - `rename` fsyncs the parent directory so the swap itself is durable
///
/// # Example
///
/// ```no_run
/// use jotdb_storage::{DiskFileSystem, FileSystem};
/// use std::path::Path;
///
/// let fs = DiskFileSystem::new();
/// fs.append(Path::new("data.db"), b"line\n", true).unwrap();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileSystem;

impl DiskFileSystem {
    /// Creates a new disk file system.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[cfg(unix)]
    fn sync_parent(path: &Path) -> StorageResult<()> {
        // On Unix, fsync on a directory syncs the directory entries
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(_path: &Path) -> StorageResult<()> {
        // Directory fsync is not directly supported on Windows
        Ok(())
    }
}

impl FileSystem for DiskFileSystem {
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn append(&self, path: &Path, data: &[u8], sync: bool) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| StorageError::from_io(path, e))?;
        file.write_all(data)?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        std::fs::rename(from, to).map_err(|e| StorageError::from_io(from, e))?;
        Self::sync_parent(to)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        std::fs::remove_file(path).map_err(|e| StorageError::from_io(path, e))
    }
}
