//! # JotDB Core
//!
//! The document store at the heart of JotDB.
//!
//! A [`Collection`] keeps schema-less documents in memory, mirrors
//! every change to an append-only journal of JSON lines, and answers
//! point and range queries through ordered secondary indices. Opening
//! a collection replays the whole journal; compaction rewrites it as
//! one line per live document while new writes keep queueing.
//!
//! ## Pieces
//!
//! - [`Collection`] is the public face: add, save, delete, query,
//!   compact.
//! - [`IndexSpec`] configures an index over any key function;
//!   [`IndexQuery`] runs point and range lookups against it.
//! - [`Journal`] appends in the background, one write in flight at a
//!   time, and can step aside for an exclusive task such as
//!   compaction.
//! - [`CollectionConfig`] carries indices, id generation and
//!   auto-compaction settings into [`Collection::open`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use jotdb_core::{Bounds, Collection, CollectionConfig, IndexSpec, MemoryFileSystem, Value};
//!
//! let fs = Arc::new(MemoryFileSystem::new());
//! let config = || CollectionConfig::new().index(IndexSpec::field("age", "age"));
//!
//! {
//!     let people = Collection::open(fs.clone(), "people.db", config())?;
//!     let mut ada = jotdb_core::Fields::new();
//!     ada.insert("name".into(), Value::from("Ada"));
//!     ada.insert("age".into(), Value::from(36));
//!     people.add(ada)?;
//! }
//!
//! // reopening replays the journal
//! let people = Collection::open(fs.clone(), "people.db", config())?;
//! assert_eq!(people.len(), 1);
//!
//! let grown = people
//!     .index("age")?
//!     .between_key_bounds(&Bounds::new().gte(Value::from(18)));
//! assert_eq!(grown.len(), 1);
//! # Ok::<(), jotdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod document;
mod error;
mod events;
mod ids;
mod index;
mod journal;
mod types;

pub use collection::{Collection, IndexQuery};
pub use config::{CollectionConfig, IdGen};
pub use document::Document;
pub use error::{CoreError, CoreResult};
pub use ids::default_id;
pub use index::{default_compare, Bounds, Comparator, IndexSpec, KeyBounds, Keyer};
pub use journal::{Journal, JournalHandle, ResumeToken};
pub use types::DocId;

pub use jotdb_codec::{CodecError, Fields, Value};
pub use jotdb_storage::{
    DiskFileSystem, FileSystem, MemoryFileSystem, StorageError, StorageResult,
};

/// Crate version, for tooling banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
