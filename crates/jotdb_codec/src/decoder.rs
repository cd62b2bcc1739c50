//! Line decoder.

use crate::error::{CodecError, CodecResult};
use crate::tags;
use crate::value::{Fields, Value};
use serde_json::Value as Json;

/// A decoded journal line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A full document: the latest version of `id` at this point in
    /// the journal.
    Doc {
        /// The document id.
        id: String,
        /// The document fields.
        fields: Fields,
    },
    /// A deletion of `id`.
    Delete {
        /// The deleted document id.
        id: String,
    },
}

impl Record {
    /// Returns the id this record concerns.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Record::Doc { id, .. } | Record::Delete { id } => id,
        }
    }
}

/// Decodes a single JSON line into a [`Record`].
///
/// A line carrying the op tag is an operation; only deletion is known.
/// Any other line is a document and must carry a string id under the
/// id tag. Type-tagged objects inside field values are revived into
/// their [`Value`] forms.
///
/// # Errors
///
/// Returns an error if the line is not valid JSON, is not an object,
/// has no usable id, or carries an unknown operation or type tag.
pub fn deserialize(line: &str) -> CodecResult<Record> {
    let json: Json = serde_json::from_str(line)?;
    let Json::Object(mut map) = json else {
        return Err(CodecError::NotAnObject);
    };

    if let Some(op) = map.remove(tags::OP) {
        return match op {
            Json::String(op) if op == tags::OP_DELETE => Ok(Record::Delete {
                id: take_id(&mut map)?,
            }),
            other => Err(CodecError::unsupported_op(json_text(&other))),
        };
    }

    let id = take_id(&mut map)?;
    let mut fields = Fields::new();
    for (key, value) in map {
        fields.insert(key, from_json(value)?);
    }
    Ok(Record::Doc { id, fields })
}

fn take_id(map: &mut serde_json::Map<String, Json>) -> CodecResult<String> {
    match map.remove(tags::ID) {
        Some(Json::String(id)) => Ok(id),
        _ => Err(CodecError::MissingId),
    }
}

/// Renders a JSON value for an error message, unquoting plain strings.
fn json_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn from_json(json: Json) -> CodecResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_json)
                .collect::<CodecResult<_>>()?,
        ),
        Json::Object(map) => from_object(map)?,
    })
}

fn from_object(mut map: serde_json::Map<String, Json>) -> CodecResult<Value> {
    let Some(tag) = map.remove(tags::TYPE) else {
        let mut fields = Fields::new();
        for (key, value) in map {
            fields.insert(key, from_json(value)?);
        }
        return Ok(Value::Object(fields));
    };

    let Json::String(tag) = tag else {
        return Err(CodecError::unsupported_tag(json_text(&tag)));
    };

    match tag.as_str() {
        tags::TAG_DATE => match map.remove(tags::TIME) {
            Some(Json::Number(ms)) => Ok(Value::Date(number_to_millis(&ms))),
            _ => Err(CodecError::invalid_payload(tags::TAG_DATE)),
        },
        tags::TAG_SET => match map.remove(tags::DATA) {
            Some(Json::Array(items)) => {
                let items = items
                    .into_iter()
                    .map(from_json)
                    .collect::<CodecResult<Vec<_>>>()?;
                Ok(Value::set(items))
            }
            _ => Err(CodecError::invalid_payload(tags::TAG_SET)),
        },
        tags::TAG_MAP => match map.remove(tags::DATA) {
            Some(Json::Array(entries)) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let Json::Array(entry) = entry else {
                        return Err(CodecError::invalid_payload(tags::TAG_MAP));
                    };
                    let mut parts = entry.into_iter();
                    match (parts.next(), parts.next(), parts.next()) {
                        (Some(k), Some(v), None) => {
                            pairs.push((from_json(k)?, from_json(v)?));
                        }
                        _ => return Err(CodecError::invalid_payload(tags::TAG_MAP)),
                    }
                }
                Ok(Value::map(pairs))
            }
            _ => Err(CodecError::invalid_payload(tags::TAG_MAP)),
        },
        tags::TAG_REGEXP => match map.remove(tags::SRC) {
            Some(Json::String(src)) => Ok(Value::Regex(src)),
            _ => Err(CodecError::invalid_payload(tags::TAG_REGEXP)),
        },
        _ => Err(CodecError::unsupported_tag(tag)),
    }
}

/// Epoch milliseconds arrive as integers; a fractional payload is
/// truncated toward zero.
fn number_to_millis(n: &serde_json::Number) -> i64 {
    n.as_i64()
        .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64)
}
