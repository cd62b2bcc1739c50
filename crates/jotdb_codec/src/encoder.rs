//! Line encoder.

use crate::error::CodecResult;
use crate::tags;
use crate::value::{Fields, Value};
use serde_json::Value as Json;

/// Largest integer a double represents exactly (2^53 - 1).
///
/// Integral numbers up to this magnitude are written without a decimal
/// point so the text form matches what the number means.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Encodes a document as a single JSON line, without the trailing newline.
///
/// The id lands under the reserved id tag; every field keeps its name.
/// Values with no native JSON form (dates, sets, maps, regexps) are
/// written as type-tagged objects that [`deserialize`] revives.
///
/// [`deserialize`]: crate::deserialize
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn serialize(id: &str, fields: &Fields) -> CodecResult<String> {
    let mut map = serde_json::Map::new();
    map.insert(tags::ID.to_string(), Json::String(id.to_string()));
    for (key, value) in fields {
        map.insert(key.clone(), to_json(value));
    }
    Ok(serde_json::to_string(&Json::Object(map))?)
}

/// Encodes a deletion of `id` as a single JSON line, without the
/// trailing newline.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn serialize_delete(id: &str) -> CodecResult<String> {
    let mut map = serde_json::Map::new();
    map.insert(tags::ID.to_string(), Json::String(id.to_string()));
    map.insert(
        tags::OP.to_string(),
        Json::String(tags::OP_DELETE.to_string()),
    );
    Ok(serde_json::to_string(&Json::Object(map))?)
}

/// Returns the canonical encoded form of a value.
///
/// Used as the identity of set members and map keys.
pub(crate) fn encoded_form(value: &Value) -> String {
    to_json(value).to_string()
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, value) in fields {
                map.insert(key.clone(), to_json(value));
            }
            Json::Object(map)
        }
        Value::Date(ms) => tagged(tags::TAG_DATE, tags::TIME, Json::from(*ms)),
        Value::Set(items) => tagged(
            tags::TAG_SET,
            tags::DATA,
            Json::Array(items.iter().map(to_json).collect()),
        ),
        Value::Map(pairs) => tagged(
            tags::TAG_MAP,
            tags::DATA,
            Json::Array(
                pairs
                    .iter()
                    .map(|(k, v)| Json::Array(vec![to_json(k), to_json(v)]))
                    .collect(),
            ),
        ),
        Value::Regex(src) => tagged(tags::TAG_REGEXP, tags::SRC, Json::String(src.clone())),
    }
}

fn tagged(tag: &str, payload_key: &str, payload: Json) -> Json {
    let mut map = serde_json::Map::new();
    map.insert(tags::TYPE.to_string(), Json::String(tag.to_string()));
    map.insert(payload_key.to_string(), payload);
    Json::Object(map)
}

/// Non-finite numbers have no JSON form and collapse to null.
/// Integral values within the exact double range are written as
/// integers so `1.0` serializes as `1`.
fn number_to_json(n: f64) -> Json {
    if !n.is_finite() {
        return Json::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Json::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: Vec<(&str, Value)>) -> Fields {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn document_line_leads_with_id() {
        let line = serialize("a1", &fields(vec![("name", Value::from("Ann"))])).unwrap();
        assert_eq!(line, r#"{"$id$":"a1","name":"Ann"}"#);
    }

    #[test]
    fn delete_line_shape() {
        let line = serialize_delete("a1").unwrap();
        assert_eq!(line, r#"{"$id$":"a1","$op$":"$del$"}"#);
    }

    #[test]
    fn integral_numbers_have_no_decimal_point() {
        let line = serialize("n", &fields(vec![("v", Value::Number(42.0))])).unwrap();
        assert_eq!(line, r#"{"$id$":"n","v":42}"#);
    }

    #[test]
    fn fractional_numbers_keep_their_fraction() {
        let line = serialize("n", &fields(vec![("v", Value::Number(2.5))])).unwrap();
        assert_eq!(line, r#"{"$id$":"n","v":2.5}"#);
    }

    #[test]
    fn non_finite_numbers_collapse_to_null() {
        let line = serialize(
            "n",
            &fields(vec![("a", Value::Number(f64::NAN)), ("b", Value::Number(f64::INFINITY))]),
        )
        .unwrap();
        assert_eq!(line, r#"{"$id$":"n","a":null,"b":null}"#);
    }

    #[test]
    fn date_encodes_as_tagged_object() {
        let line = serialize("d", &fields(vec![("t", Value::Date(86_400_000))])).unwrap();
        assert_eq!(line, r#"{"$id$":"d","t":{"$type$":"date","time":86400000}}"#);
    }

    #[test]
    fn set_encodes_as_tagged_array() {
        let set = Value::set(vec![Value::from(1), Value::from(2)]);
        let line = serialize("s", &fields(vec![("v", set)])).unwrap();
        assert_eq!(line, r#"{"$id$":"s","v":{"$type$":"set","data":[1,2]}}"#);
    }

    #[test]
    fn map_encodes_entries_as_pairs() {
        let map = Value::map(vec![(Value::from("k"), Value::from(7))]);
        let line = serialize("m", &fields(vec![("v", map)])).unwrap();
        assert_eq!(line, r#"{"$id$":"m","v":{"$type$":"map","data":[["k",7]]}}"#);
    }

    #[test]
    fn regexp_encodes_source_text() {
        let line = serialize("r", &fields(vec![("v", Value::Regex("^a+$".into()))])).unwrap();
        assert_eq!(line, r#"{"$id$":"r","v":{"$type$":"regexp","src":"^a+$"}}"#);
    }

    #[test]
    fn nested_values_encode_recursively() {
        let inner = fields(vec![("when", Value::Date(0))]);
        let line = serialize(
            "x",
            &fields(vec![(
                "events",
                Value::Array(vec![Value::Object(inner)]),
            )]),
        )
        .unwrap();
        assert_eq!(
            line,
            r#"{"$id$":"x","events":[{"when":{"$type$":"date","time":0}}]}"#
        );
    }
}
