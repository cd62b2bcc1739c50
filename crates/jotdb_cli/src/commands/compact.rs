//! Compact command implementation.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{mpsc, Arc};

use jotdb_codec::{Fields, Record};
use jotdb_core::{Collection, CollectionConfig, DiskFileSystem};

/// Compaction analysis.
#[derive(Debug)]
pub struct CompactAnalysis {
    /// Document lines in the log.
    pub doc_lines: usize,
    /// Delete markers in the log.
    pub delete_lines: usize,
    /// Documents alive after replay.
    pub live_documents: usize,
    /// Bytes before compaction.
    pub bytes_before: usize,
    /// Bytes the rewritten log will occupy.
    pub bytes_after: usize,
}

impl CompactAnalysis {
    fn is_compact(&self) -> bool {
        self.delete_lines == 0 && self.doc_lines == self.live_documents
    }
}

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting log at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let text = super::read_log_text(path)?;
    let analysis = analyze(&text)?;

    println!("Analysis:");
    println!("  document lines: {}", analysis.doc_lines);
    println!("  delete lines:   {}", analysis.delete_lines);
    println!("  live documents: {}", analysis.live_documents);
    println!();
    println!("  Size before: {}", format_size(analysis.bytes_before));
    println!("  Size after:  {}", format_size(analysis.bytes_after));
    println!(
        "  Space saved: {} ({:.1}%)",
        format_size(analysis.bytes_before.saturating_sub(analysis.bytes_after)),
        if analysis.bytes_before > 0 {
            (analysis.bytes_before.saturating_sub(analysis.bytes_after)) as f64
                / analysis.bytes_before as f64
                * 100.0
        } else {
            0.0
        }
    );

    if dry_run {
        return Ok(());
    }
    if analysis.is_compact() {
        println!();
        println!("No compaction needed - log is already compact");
        return Ok(());
    }

    println!();
    println!("Performing compaction...");

    let config = CollectionConfig::new()
        .auto_compact(false)
        .on_error(|err| tracing::error!(error = %err, "compaction error"));
    let collection = Collection::open(Arc::new(DiskFileSystem::new()), path, config)?;

    let (done_tx, done_rx) = mpsc::channel();
    collection.compact_with(move |err| {
        let _ = done_tx.send(err.map(|e| e.to_string()));
    })?;
    if let Some(err) = done_rx.recv()? {
        return Err(err.into());
    }
    drop(collection);

    let after = super::read_log_text(path)?;
    println!("✓ Compaction complete ({})", format_size(after.len()));

    Ok(())
}

/// Replays the log and prices the rewrite. Refuses corrupt logs.
fn analyze(text: &str) -> Result<CompactAnalysis, Box<dyn std::error::Error>> {
    let mut doc_lines = 0;
    let mut delete_lines = 0;
    let mut live: BTreeMap<String, Fields> = BTreeMap::new();

    for (number, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        match jotdb_codec::deserialize(line) {
            Ok(Record::Doc { id, fields }) => {
                doc_lines += 1;
                live.insert(id, fields);
            }
            Ok(Record::Delete { id }) => {
                delete_lines += 1;
                live.remove(&id);
            }
            Err(err) => {
                return Err(format!("line {}: {}", number + 1, err).into());
            }
        }
    }

    // the rewrite is one serialized line per live document, in id order
    let mut bytes_after = 0;
    for (id, fields) in &live {
        bytes_after += jotdb_codec::serialize(id, fields)?.len() + 1;
    }

    Ok(CompactAnalysis {
        doc_lines,
        delete_lines,
        live_documents: live.len(),
        bytes_before: text.len(),
        bytes_after,
    })
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
