//! Inspect command implementation.

use jotdb_codec::Record;
use serde::Serialize;
use std::path::Path;

/// One printed record.
#[derive(Debug, Serialize)]
pub struct InspectRecord {
    /// 1-based line number in the log.
    pub line: usize,
    /// Record kind: `doc`, `del` or `corrupt`.
    pub op: String,
    /// Document id, when the line decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The stored fields, tagged forms included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
    /// Decode error, for corrupt lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    offset: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = super::read_log_text(path)?;

    let mut records = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        records.push(decode(number + 1, line));
    }

    let shown: Vec<&InspectRecord> = records
        .iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        _ => {
            println!("Log: {} ({} records)", path.display(), records.len());
            println!();
            for record in &shown {
                print_record(record);
            }
        }
    }

    Ok(())
}

fn decode(line_number: usize, line: &str) -> InspectRecord {
    match jotdb_codec::deserialize(line) {
        Ok(Record::Doc { id, .. }) => InspectRecord {
            line: line_number,
            op: "doc".to_string(),
            id: Some(id),
            fields: stored_fields(line),
            error: None,
        },
        Ok(Record::Delete { id }) => InspectRecord {
            line: line_number,
            op: "del".to_string(),
            id: Some(id),
            fields: None,
            error: None,
        },
        Err(err) => InspectRecord {
            line: line_number,
            op: "corrupt".to_string(),
            id: None,
            fields: None,
            error: Some(err.to_string()),
        },
    }
}

/// The line's JSON object minus the bookkeeping tags, showing the
/// fields exactly as they sit in the file.
fn stored_fields(line: &str) -> Option<serde_json::Value> {
    let mut json: serde_json::Value = serde_json::from_str(line).ok()?;
    if let Some(map) = json.as_object_mut() {
        map.remove("$id$");
        map.remove("$op$");
    }
    Some(json)
}

fn print_record(record: &InspectRecord) {
    match record.op.as_str() {
        "doc" => {
            let fields = record
                .fields
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!(
                "#{:<6} doc  {:<26} {}",
                record.line,
                record.id.as_deref().unwrap_or("-"),
                fields
            );
        }
        "del" => {
            println!(
                "#{:<6} del  {:<26}",
                record.line,
                record.id.as_deref().unwrap_or("-")
            );
        }
        _ => {
            println!(
                "#{:<6} corrupt: {}",
                record.line,
                record.error.as_deref().unwrap_or("unknown")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_classifies_docs_deletes_and_garbage() {
        let doc = decode(1, r#"{"$id$":"a","n":1}"#);
        assert_eq!(doc.op, "doc");
        assert_eq!(doc.id.as_deref(), Some("a"));
        assert!(doc.fields.is_some());

        let del = decode(2, r#"{"$id$":"a","$op$":"$del$"}"#);
        assert_eq!(del.op, "del");
        assert!(del.fields.is_none());

        let bad = decode(3, "not json");
        assert_eq!(bad.op, "corrupt");
        assert!(bad.error.is_some());
    }

    #[test]
    fn stored_fields_strips_the_bookkeeping_tags() {
        let fields = stored_fields(r#"{"$id$":"a","name":"Ann"}"#).unwrap();
        assert_eq!(fields, serde_json::json!({"name": "Ann"}));
    }
}
