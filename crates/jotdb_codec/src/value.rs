//! Dynamic document value type.

use std::collections::BTreeMap;

/// The fields of a document: named values, ordered by name.
pub type Fields = BTreeMap<String, Value>;

/// A dynamic document value.
///
/// This type represents any value a JotDB document can hold. The first
/// six variants map directly onto JSON; the remaining four have no
/// native JSON form and travel through the line format as type-tagged
/// objects (see [`deserialize`] and [`serialize`]).
///
/// Numbers are IEEE 754 doubles throughout, so `Value` is `PartialEq`
/// but not `Eq`.
///
/// [`deserialize`]: crate::deserialize
/// [`serialize`]: crate::serialize
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value (IEEE 754 double).
    Number(f64),
    /// Text string (UTF-8).
    String(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Nested object: named values, ordered by name.
    Object(Fields),
    /// Timestamp in milliseconds since the Unix epoch.
    Date(i64),
    /// Collection of unique values, in insertion order.
    ///
    /// Uniqueness is by encoded form. Construct through [`Value::set`]
    /// to uphold it.
    Set(Vec<Value>),
    /// Key-value pairs with unique keys, in insertion order.
    ///
    /// Unlike [`Value::Object`], keys may be any value and entry order
    /// is preserved. Construct through [`Value::map`].
    Map(Vec<(Value, Value)>),
    /// Regular expression pattern source text.
    ///
    /// Stored and compared as text; no pattern engine is attached.
    Regex(String),
}

impl Value {
    /// Creates a set from `items`, dropping duplicates.
    ///
    /// Duplicates are detected by encoded form; the first occurrence
    /// keeps its position.
    #[must_use]
    pub fn set(items: Vec<Value>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut unique = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(crate::encoder::encoded_form(&item)) {
                unique.push(item);
            }
        }
        Value::Set(unique)
    }

    /// Creates a map from `pairs`, deduplicating keys.
    ///
    /// Keys are compared by encoded form. A repeated key keeps its
    /// first position but takes the last value, like repeated inserts
    /// into a map.
    #[must_use]
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut order: Vec<(String, Value, Value)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let form = crate::encoder::encoded_form(&key);
            if let Some(entry) = order.iter_mut().find(|(f, _, _)| *f == form) {
                entry.2 = value;
            } else {
                order.push((form, key, value));
            }
        }
        Value::Map(order.into_iter().map(|(_, k, v)| (k, v)).collect())
    }

    /// Returns the name of this value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Date(_) => "date",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Regex(_) => "regexp",
        }
    }

    /// Renders the value as the JSON text it would occupy on a log
    /// line, tagged forms included.
    #[must_use]
    pub fn to_json_text(&self) -> String {
        crate::encoder::encoded_form(self)
    }

    /// Returns `true` if this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the inner `bool` if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the inner `f64` if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the inner string slice if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner slice if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the inner fields if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the epoch milliseconds if this is a date.
    #[must_use]
    pub fn as_date(&self) -> Option<i64> {
        match self {
            Value::Date(ms) => Some(*ms),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}
