//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The line is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The line is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The line parsed to something other than a JSON object.
    #[error("line is not a JSON object")]
    NotAnObject,

    /// The line carries no usable id tag.
    ///
    /// Raised when the id tag is absent or its value is not a string.
    #[error("line is missing the id tag")]
    MissingId,

    /// A type-tagged object names a type this codec does not know.
    #[error("unsupported type tag: {tag}")]
    UnsupportedTag {
        /// The unrecognized tag value.
        tag: String,
    },

    /// An operation line names an operation this codec does not know.
    #[error("unsupported operation: {op}")]
    UnsupportedOp {
        /// The unrecognized operation value.
        op: String,
    },

    /// A type-tagged object is missing or mistypes its payload field.
    #[error("malformed {tag} payload")]
    InvalidPayload {
        /// The tag whose payload was malformed.
        tag: String,
    },
}

impl CodecError {
    /// Create an unsupported type tag error.
    pub fn unsupported_tag(tag: impl Into<String>) -> Self {
        Self::UnsupportedTag { tag: tag.into() }
    }

    /// Create an unsupported operation error.
    pub fn unsupported_op(op: impl Into<String>) -> Self {
        Self::UnsupportedOp { op: op.into() }
    }

    /// Create a malformed payload error.
    pub fn invalid_payload(tag: impl Into<String>) -> Self {
        Self::InvalidPayload { tag: tag.into() }
    }
}
