//! Stats command implementation.

use jotdb_codec::Record;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Aggregate counts over one log file.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Log path.
    pub path: String,
    /// File size in bytes.
    pub file_size: usize,
    /// Document lines.
    pub doc_lines: usize,
    /// Delete markers.
    pub delete_lines: usize,
    /// Blank lines.
    pub blank_lines: usize,
    /// Lines that did not decode.
    pub corrupt_lines: usize,
    /// Documents alive after a full replay.
    pub live_documents: usize,
    /// Document lines replaced by a later line for the same id.
    pub superseded_lines: usize,
    /// Whether an opening collection would leave the log as is.
    pub already_compact: bool,
}

/// Runs the stats command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let text = super::read_log_text(path)?;
    let report = analyze(path, &text);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_text_output(&report),
    }

    Ok(())
}

fn analyze(path: &Path, text: &str) -> StatsReport {
    let mut doc_lines = 0;
    let mut delete_lines = 0;
    let mut blank_lines = 0;
    let mut corrupt_lines = 0;
    let mut live: BTreeSet<String> = BTreeSet::new();

    for line in text.lines() {
        if line.is_empty() {
            blank_lines += 1;
            continue;
        }
        match jotdb_codec::deserialize(line) {
            Ok(Record::Doc { id, .. }) => {
                doc_lines += 1;
                live.insert(id);
            }
            Ok(Record::Delete { id }) => {
                delete_lines += 1;
                live.remove(&id);
            }
            Err(_) => corrupt_lines += 1,
        }
    }

    let live_documents = live.len();
    let superseded_lines = doc_lines - live_documents;
    StatsReport {
        path: path.display().to_string(),
        file_size: text.len(),
        doc_lines,
        delete_lines,
        blank_lines,
        corrupt_lines,
        live_documents,
        superseded_lines,
        already_compact: delete_lines == 0 && superseded_lines == 0 && corrupt_lines == 0,
    }
}

fn print_text_output(report: &StatsReport) {
    println!("JotDB Log Statistics");
    println!("====================");
    println!();
    println!("Path: {}", report.path);
    println!("Size: {} bytes", report.file_size);
    println!();
    println!("Lines:");
    println!("  documents:  {}", report.doc_lines);
    println!("  deletes:    {}", report.delete_lines);
    println!("  blank:      {}", report.blank_lines);
    println!("  corrupt:    {}", report.corrupt_lines);
    println!();
    println!("Replay:");
    println!("  live documents:   {}", report.live_documents);
    println!("  superseded lines: {}", report.superseded_lines);
    println!(
        "  compact: {}",
        if report.already_compact {
            "yes"
        } else {
            "no (a reopen with auto-compaction would rewrite it)"
        }
    );
}
