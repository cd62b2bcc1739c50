//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod stats;
pub mod verify;

use std::path::Path;

use jotdb_storage::{DiskFileSystem, FileSystem};

/// Reads the whole log as text.
pub fn read_log_text(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = DiskFileSystem::new().read_file(path)?;
    Ok(String::from_utf8(bytes)?)
}
