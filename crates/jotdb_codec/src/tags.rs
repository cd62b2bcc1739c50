//! Reserved keys and tag values of the line format.
//!
//! Every stored line is a JSON object. Two keys are reserved at the top
//! level: the id tag names the document, and the op tag (when present)
//! turns the line into an operation instead of a document. Inside field
//! values, objects carrying the type tag encode values JSON has no
//! native form for.

/// Top-level key holding the document id.
pub(crate) const ID: &str = "$id$";

/// Top-level key marking an operation line.
pub(crate) const OP: &str = "$op$";

/// Operation value for a deletion.
pub(crate) const OP_DELETE: &str = "$del$";

/// Key marking a type-tagged value object.
pub(crate) const TYPE: &str = "$type$";

/// Tag value for timestamps, payload under [`TIME`].
pub(crate) const TAG_DATE: &str = "date";

/// Tag value for sets, payload under [`DATA`].
pub(crate) const TAG_SET: &str = "set";

/// Tag value for maps, payload under [`DATA`] as two-element arrays.
pub(crate) const TAG_MAP: &str = "map";

/// Tag value for regular expressions, payload under [`SRC`].
pub(crate) const TAG_REGEXP: &str = "regexp";

/// Payload key of date tags: milliseconds since the Unix epoch.
pub(crate) const TIME: &str = "time";

/// Payload key of set and map tags.
pub(crate) const DATA: &str = "data";

/// Payload key of regexp tags: the pattern source text.
pub(crate) const SRC: &str = "src";
