//! # JotDB Storage
//!
//! File system abstraction and implementations for JotDB.
//!
//! This crate provides the lowest-level storage abstraction for JotDB.
//! File systems are **opaque byte stores** addressed by path - they do
//! not interpret the data they store.
//!
//! ## Design Principles
//!
//! - File systems work on whole files (read, append, rename, remove)
//! - No knowledge of JotDB line formats, journals, or documents
//! - Must be `Send + Sync` for concurrent access
//! - JotDB owns all file format interpretation
//!
//! ## Available Implementations
//!
//! - [`MemoryFileSystem`] - For testing and ephemeral stores
//! - [`DiskFileSystem`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use jotdb_storage::{FileSystem, MemoryFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.append(Path::new("data.db"), b"hello world\n", false).unwrap();
//! let data = fs.read_file(Path::new("data.db")).unwrap();
//! assert_eq!(&data, b"hello world\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod disk;
mod error;
mod fs;
mod memory;

pub use disk::DiskFileSystem;
pub use error::{StorageError, StorageResult};
pub use fs::FileSystem;
pub use memory::MemoryFileSystem;
