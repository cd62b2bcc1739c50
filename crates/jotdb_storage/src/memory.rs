//! In-memory file system for testing.

use crate::error::{StorageError, StorageResult};
use crate::fs::FileSystem;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An in-memory file system.
///
/// This implementation stores all files in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Fault Injection
///
/// Failures can be injected to exercise error and crash recovery paths:
/// [`fail_next_appends`], [`fail_next_renames`], and [`set_fail_on_sync`].
/// [`fork`] snapshots the current files into a fresh instance, which models
/// what a new process would see after a power cut at that instant.
///
/// [`fail_next_appends`]: MemoryFileSystem::fail_next_appends
/// [`fail_next_renames`]: MemoryFileSystem::fail_next_renames
/// [`set_fail_on_sync`]: MemoryFileSystem::set_fail_on_sync
/// [`fork`]: MemoryFileSystem::fork
///
/// # Example
///
/// ```rust
/// use jotdb_storage::{FileSystem, MemoryFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.append(Path::new("a.db"), b"one\n", false).unwrap();
/// fs.append(Path::new("a.db"), b"two\n", true).unwrap();
/// assert_eq!(fs.read_file(Path::new("a.db")).unwrap(), b"one\ntwo\n");
/// ```
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_appends: AtomicUsize,
    fail_renames: AtomicUsize,
    fail_sync: AtomicBool,
}

impl MemoryFileSystem {
    /// Creates a new empty in-memory file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current files into a fresh instance.
    ///
    /// The snapshot shares no state with `self` and carries no pending
    /// faults. Useful for crash recovery tests: mutate, fork, and reopen
    /// the fork as if the process had died at the fork point.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            files: Mutex::new(self.files.lock().clone()),
            fail_appends: AtomicUsize::new(0),
            fail_renames: AtomicUsize::new(0),
            fail_sync: AtomicBool::new(false),
        }
    }

    /// Returns `true` if a file exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Returns all stored paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Makes the next `n` appends fail without writing anything.
    pub fn fail_next_appends(&self, n: usize) {
        self.fail_appends.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` renames fail without moving anything.
    pub fn fail_next_renames(&self, n: usize) {
        self.fail_renames.store(n, Ordering::SeqCst);
    }

    /// Sets whether synced appends fail.
    ///
    /// A failing synced append still stores the data first, modeling a
    /// write that reached the OS but could not be forced to disk.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Clears all pending faults.
    pub fn reset_faults(&self) {
        self.fail_appends.store(0, Ordering::SeqCst);
        self.fail_renames.store(0, Ordering::SeqCst);
        self.fail_sync.store(false, Ordering::SeqCst);
    }

    /// Consumes one pending fault from `counter` if any remain.
    fn take_fault(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("injected {what} failure"),
        ))
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn append(&self, path: &Path, data: &[u8], sync: bool) -> StorageResult<()> {
        if Self::take_fault(&self.fail_appends) {
            return Err(Self::injected("append"));
        }

        let mut files = self.files.lock();
        files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(data);

        if sync && self.fail_sync.load(Ordering::SeqCst) {
            return Err(Self::injected("sync"));
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        if Self::take_fault(&self.fail_renames) {
            return Err(Self::injected("rename"));
        }

        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| StorageError::NotFound {
            path: from.to_path_buf(),
        })?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let fs = MemoryFileSystem::new();
        assert!(fs.paths().is_empty());
    }

    #[test]
    fn memory_append_and_read() {
        let fs = MemoryFileSystem::new();
        fs.append(Path::new("x.db"), b"hello", false).unwrap();
        fs.append(Path::new("x.db"), b" world", false).unwrap();

        assert_eq!(fs.read_file(Path::new("x.db")).unwrap(), b"hello world");
    }

    #[test]
    fn memory_read_missing_is_not_found() {
        let fs = MemoryFileSystem::new();
        assert!(fs.read_file(Path::new("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_rename_replaces_destination() {
        let fs = MemoryFileSystem::new();
        fs.append(Path::new("a"), b"fresh", false).unwrap();
        fs.append(Path::new("b"), b"stale", false).unwrap();

        fs.rename(Path::new("a"), Path::new("b")).unwrap();

        assert!(!fs.contains(Path::new("a")));
        assert_eq!(fs.read_file(Path::new("b")).unwrap(), b"fresh");
    }

    #[test]
    fn memory_rename_missing_source_is_not_found() {
        let fs = MemoryFileSystem::new();
        let err = fs.rename(Path::new("a"), Path::new("b")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn memory_remove_deletes_file() {
        let fs = MemoryFileSystem::new();
        fs.append(Path::new("a"), b"data", false).unwrap();

        fs.remove(Path::new("a")).unwrap();

        assert!(!fs.contains(Path::new("a")));
        assert!(fs.remove(Path::new("a")).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_injected_append_fails_without_writing() {
        let fs = MemoryFileSystem::new();
        fs.fail_next_appends(1);

        assert!(fs.append(Path::new("a"), b"lost", false).is_err());
        assert!(!fs.contains(Path::new("a")));

        // Fault consumed; next append succeeds
        fs.append(Path::new("a"), b"kept", false).unwrap();
        assert_eq!(fs.read_file(Path::new("a")).unwrap(), b"kept");
    }

    #[test]
    fn memory_injected_sync_fails_after_writing() {
        let fs = MemoryFileSystem::new();
        fs.set_fail_on_sync(true);

        assert!(fs.append(Path::new("a"), b"landed", true).is_err());
        assert_eq!(fs.read_file(Path::new("a")).unwrap(), b"landed");

        // Unsynced appends are unaffected
        fs.append(Path::new("a"), b" more", false).unwrap();
        assert_eq!(fs.read_file(Path::new("a")).unwrap(), b"landed more");
    }

    #[test]
    fn memory_injected_rename_leaves_files_in_place() {
        let fs = MemoryFileSystem::new();
        fs.append(Path::new("a"), b"data", false).unwrap();
        fs.fail_next_renames(1);

        assert!(fs.rename(Path::new("a"), Path::new("b")).is_err());
        assert!(fs.contains(Path::new("a")));
        assert!(!fs.contains(Path::new("b")));
    }

    #[test]
    fn memory_fork_is_independent() {
        let fs = MemoryFileSystem::new();
        fs.append(Path::new("a"), b"before", false).unwrap();

        let snapshot = fs.fork();
        fs.append(Path::new("a"), b" after", false).unwrap();

        assert_eq!(snapshot.read_file(Path::new("a")).unwrap(), b"before");
        assert_eq!(fs.read_file(Path::new("a")).unwrap(), b"before after");
    }

    #[test]
    fn memory_fork_drops_pending_faults() {
        let fs = MemoryFileSystem::new();
        fs.fail_next_appends(5);

        let snapshot = fs.fork();
        snapshot.append(Path::new("a"), b"fine", false).unwrap();
    }
}
