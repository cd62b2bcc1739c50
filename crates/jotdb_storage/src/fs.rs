//! File system trait definition.

use crate::error::StorageResult;
use std::path::Path;

/// A low-level file system for JotDB.
///
/// File systems are **opaque byte stores** addressed by path. They provide
/// simple operations for reading, appending, renaming, and removing whole
/// files. JotDB owns all file format interpretation - file systems do not
/// understand journal lines, documents, or indices.
///
/// # Invariants
///
/// - `append` creates the file if it does not exist
/// - `read_file` returns exactly the bytes previously appended, in order
/// - `rename` replaces the destination if it exists
/// - All operations on missing files report [`StorageError::NotFound`]
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
///
/// # Implementors
///
/// - [`super::MemoryFileSystem`] - For testing
/// - [`super::DiskFileSystem`] - For persistent storage
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist, or
    /// an I/O error if the read fails.
    ///
    /// [`StorageError::NotFound`]: crate::StorageError::NotFound
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Appends `data` to the end of the file at `path`, creating it if
    /// it does not exist.
    ///
    /// When `sync` is true, the data is forced to durable storage before
    /// this returns. After a successful synced append the data survives
    /// process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails.
    fn append(&self, path: &Path, data: &[u8], sync: bool) -> StorageResult<()>;

    /// Renames the file at `from` to `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `from` does not exist, or
    /// an I/O error if the rename fails.
    ///
    /// [`StorageError::NotFound`]: crate::StorageError::NotFound
    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist, or
    /// an I/O error if the removal fails.
    ///
    /// [`StorageError::NotFound`]: crate::StorageError::NotFound
    fn remove(&self, path: &Path) -> StorageResult<()>;
}
