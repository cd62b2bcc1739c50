//! Default ordering for index keys.
//!
//! Keys in one index may mix types freely, so the default comparator
//! has to resolve comparisons between, say, a number and a string. It
//! does so in stages: structural equality first, then empty-ish values
//! after everything else, then numeric and textual interpretations,
//! and finally the type name as a tiebreak.

use std::cmp::Ordering;

use jotdb_codec::Value;

/// Compares two index keys.
///
/// The ordering is total: any two values resolve to an [`Ordering`].
/// Stages, applied in order until one decides:
///
/// 1. Structurally equal values are `Equal`.
/// 2. If exactly one side is empty-ish (`null`, `false`, `0`, NaN or
///    `""`), it sorts after the other side.
/// 3. Two strings compare lexicographically.
/// 4. If both sides have a numeric interpretation (numbers, booleans,
///    dates, numeric strings), they compare numerically.
/// 5. If both sides have a textual form, the forms compare
///    lexicographically. Arrays join their elements' forms with `,`.
/// 6. Anything left compares by type name.
///
/// Values of one type always order consistently; mixed-type keys get
/// a stable, if somewhat arbitrary, placement.
#[must_use]
pub fn default_compare(a: &Value, b: &Value) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    match (is_empty_ish(a), is_empty_ish(b)) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }

    if let (Value::String(a), Value::String(b)) = (a, b) {
        return a.cmp(b);
    }

    // NaN on either side yields no ordering here and falls through.
    if let Some(ordering) = numeric_compare(a, b) {
        return ordering;
    }

    if let (Some(a), Some(b)) = (text_form(a), text_form(b)) {
        return a.cmp(&b);
    }

    a.type_name().cmp(b.type_name())
}

fn is_empty_ish(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => *n == 0.0 || n.is_nan(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn numeric_compare(a: &Value, b: &Value) -> Option<Ordering> {
    let a = numeric_form(a)?;
    let b = numeric_form(b)?;
    a.partial_cmp(&b)
}

fn numeric_form(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Date(ms) => Some(*ms as f64),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Numeric reading of a string key. An all-whitespace string counts
/// as zero; anything unparseable has no numeric form.
fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok()
}

fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Regex(src) => Some(src.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Date(ms) => Some(ms.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| text_form(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) | Value::Set(_) | Value::Map(_) => None,
    }
}
