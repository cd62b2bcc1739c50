//! Error types for the core engine.

use thiserror::Error;

/// Errors produced by collections, indices and the journal.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An underlying file operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] jotdb_storage::StorageError),

    /// A log line could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] jotdb_codec::CodecError),

    /// An insert or update would duplicate a key in a unique index.
    #[error("unique index `{index}` already holds key {key}")]
    UniqueViolation {
        /// Name of the violated index.
        index: String,
        /// Offending key, rendered as JSON.
        key: String,
    },

    /// An index with the same name is already registered.
    #[error("index `{name}` already exists")]
    IndexExists {
        /// Name of the conflicting index.
        name: String,
    },

    /// No index with the requested name is registered.
    #[error("no index named `{name}`")]
    UnknownIndex {
        /// The requested name.
        name: String,
    },

    /// The operation needs a backing file, but the collection is
    /// memory-only.
    #[error("collection is not persistent")]
    NotPersistent,
}

impl CoreError {
    /// Creates a [`CoreError::UniqueViolation`].
    #[must_use]
    pub fn unique_violation(index: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UniqueViolation {
            index: index.into(),
            key: key.into(),
        }
    }

    /// Creates a [`CoreError::IndexExists`].
    #[must_use]
    pub fn index_exists(name: impl Into<String>) -> Self {
        Self::IndexExists { name: name.into() }
    }

    /// Creates a [`CoreError::UnknownIndex`].
    #[must_use]
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::UnknownIndex { name: name.into() }
    }

    /// Returns `true` for [`CoreError::UniqueViolation`].
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_display_names_index_and_key() {
        let err = CoreError::unique_violation("email", "\"a@b.c\"");
        assert_eq!(
            err.to_string(),
            "unique index `email` already holds key \"a@b.c\""
        );
        assert!(err.is_unique_violation());
    }

    #[test]
    fn storage_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = CoreError::from(jotdb_storage::StorageError::from(io));
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn unknown_index_display() {
        let err = CoreError::unknown_index("age");
        assert_eq!(err.to_string(), "no index named `age`");
    }
}
