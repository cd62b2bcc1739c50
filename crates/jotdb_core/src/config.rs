//! Collection configuration.

use std::fmt;
use std::sync::Arc;

use crate::error::CoreError;
use crate::ids::default_id;
use crate::index::IndexSpec;

/// Generator for new document ids.
pub type IdGen = Arc<dyn Fn() -> String + Send + Sync>;

type ErrorListener = Box<dyn Fn(&CoreError) + Send + Sync>;

/// Configuration for opening a collection.
///
/// ```
/// use jotdb_core::{CollectionConfig, IndexSpec};
///
/// let config = CollectionConfig::new()
///     .index(IndexSpec::field("name", "name"))
///     .index(IndexSpec::field("age", "age"))
///     .auto_compact(false);
/// assert_eq!(config.indices.len(), 2);
/// ```
pub struct CollectionConfig {
    /// Indices registered before the collection becomes usable.
    pub indices: Vec<IndexSpec>,

    /// Whether to rewrite a noisy log right after it loads. A log is
    /// noisy when replaying it hit a delete or a superseded document.
    pub auto_compact: bool,

    /// Generator for ids of documents added without one.
    pub id_gen: IdGen,

    pub(crate) on_error: Option<ErrorListener>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            auto_compact: true,
            id_gen: Arc::new(default_id),
            on_error: None,
        }
    }
}

impl CollectionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one index.
    #[must_use]
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indices.push(spec);
        self
    }

    /// Sets whether a noisy log is rewritten right after load.
    #[must_use]
    pub fn auto_compact(mut self, value: bool) -> Self {
        self.auto_compact = value;
        self
    }

    /// Replaces the default id generator.
    #[must_use]
    pub fn id_gen(mut self, generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_gen = Arc::new(generator);
        self
    }

    /// Attaches an error listener before anything can go wrong.
    ///
    /// Equivalent to [`Collection::on_error`](crate::Collection::on_error),
    /// but in place early enough to observe failures from a compaction
    /// scheduled during load.
    #[must_use]
    pub fn on_error(mut self, listener: impl Fn(&CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(listener));
        self
    }
}

impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("indices", &self.indices)
            .field("auto_compact", &self.auto_compact)
            .finish_non_exhaustive()
    }
}
