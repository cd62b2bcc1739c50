//! Address Book Example
//!
//! This example demonstrates:
//! - Opening a persistent collection with several indices
//! - Point and range queries, including date ranges
//! - Updating and deleting documents
//! - Compacting the log and reloading it from disk
//!
//! Run with `RUST_LOG=jotdb_core=debug` to watch the engine work.

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use chrono::NaiveDate;
use jotdb_core::{
    Bounds, Collection, CollectionConfig, DiskFileSystem, Document, Fields, FileSystem, IndexSpec,
    Value,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("address_book.db");

    println!("📇 Address Book Example");
    println!("=======================\n");

    let book = open_book(&path)?;
    let (idle_tx, idle_rx) = mpsc::channel();
    book.on_idle(move || {
        let _ = idle_tx.send(());
    });
    let (compact_tx, compact_rx) = mpsc::channel();
    book.on_compact(move || {
        let _ = compact_tx.send(());
    });

    // Seed a few people, plus two documents the keyed indices skip:
    // one without an age and one whose age is not a number.
    println!("📥 Adding people...");
    let (tx, rx) = mpsc::channel();
    let added = book.add_batch_with(
        vec![
            person("Compl", 37.0, date_millis(1979, 11, 15)?),
            person("Ting", 25.0, date_millis(1990, 10, 27)?),
        ],
        move |err| {
            let _ = tx.send(err.map(|e| e.to_string()));
        },
    )?;
    settle(&rx)?;
    for doc in &added {
        println!("  + {} [{}]", show(doc), doc.id());
    }

    let mut no_age = Fields::new();
    no_age.insert("name".into(), Value::from("no-age"));
    let mut secret = Fields::new();
    secret.insert("age".into(), Value::from("secret"));
    let (tx, rx) = mpsc::channel();
    book.add_batch_with(vec![no_age, secret], move |err| {
        let _ = tx.send(err.map(|e| e.to_string()));
    })?;
    settle(&rx)?;
    println!("  population: {}", book.len());

    // Range query over the numeric age index
    println!("\n🔍 Ages over 20 up to 90:");
    let hits = book
        .index("age")?
        .between_key_bounds(&Bounds::new().gt(20).lte(90));
    for doc in &hits {
        println!("  • {}", show(doc));
    }

    // Update the first hit and watch it move in the index
    if let Some(mut doc) = hits.into_iter().next() {
        doc.set("age", 30.0);
        doc.set("birth", Value::Date(date_millis(1986, 3, 5)?));
        let (tx, rx) = mpsc::channel();
        book.save_with(&doc, move |err| {
            let _ = tx.send(err.map(|e| e.to_string()));
        })?;
        settle(&rx)?;
        println!("\n✏️  Updated {}", show(&doc));

        println!("\n🔍 Ages over 28 after the update:");
        for doc in book
            .index("age")?
            .between_key_bounds(&Bounds::new().gt(28))
        {
            println!("  • {}", show(&doc));
        }
    }

    // Point query by name
    println!("\n🔎 Looking up Ting by name:");
    for doc in book.index("name")?.search_by_key(&Value::from("Ting")) {
        println!("  • {} [{}]", show(&doc), doc.id());
    }

    // Date range queries, first with raw keys and then with example
    // documents the index keyer extracts the keys from
    println!("\n📅 Born in the 1980s:");
    let eighties = Bounds::new()
        .gte(Value::Date(date_millis(1980, 1, 1)?))
        .lt(Value::Date(date_millis(1990, 1, 1)?));
    for doc in book.index("birth")?.between_key_bounds(&eighties) {
        println!("  • {}", show(&doc));
    }

    println!("\n📅 Born in the 1970s (bounds from example documents):");
    let mut low = Fields::new();
    low.insert("birth".into(), Value::Date(date_millis(1970, 1, 1)?));
    let mut high = Fields::new();
    high.insert("birth".into(), Value::Date(date_millis(1980, 1, 1)?));
    for doc in book
        .index("birth")?
        .between_bounds(Bounds::new().gte(low).lt(high))
    {
        println!("  • {}", show(&doc));
    }

    // Delete Compl, located through an example document this time
    println!("\n🗑️  Deleting Compl...");
    let mut example = Fields::new();
    example.insert("name".into(), Value::from("Compl"));
    if let Some(doc) = book.index("name")?.search(&example).into_iter().next() {
        let (tx, rx) = mpsc::channel();
        book.delete_with(&doc, move |err| {
            let _ = tx.send(err.map(|e| e.to_string()));
        })?;
        settle(&rx)?;
    }
    println!("  population: {}", book.len());

    // Every write above has been acknowledged, so the next idle event
    // means the whole session is on disk.
    idle_rx.recv()?;
    println!("\n💤 Journal idle - every write is on disk");
    println!("  log lines: {}", log_lines(&path)?);

    // Compaction rewrites the log to one line per live document
    println!("\n🧹 Compacting the log...");
    let (tx, rx) = mpsc::channel();
    book.compact_with(move |err| {
        let _ = tx.send(err.map(|e| e.to_string()));
    })?;
    settle(&rx)?;
    compact_rx.recv()?;
    println!("  log lines after compaction: {}", log_lines(&path)?);

    // Reload from disk and make sure everyone survived
    println!("\n💾 Reopening from disk...");
    drop(book);
    let book = open_book(&path)?;
    println!("  population after reload: {}", book.len());
    for doc in book.docs() {
        println!("  • {}", show(&doc));
    }

    println!("\n👋 Done");
    Ok(())
}

/// Opens the address book with its three indices. Ages index only
/// when numeric and births only when they are dates, so documents
/// missing either stay out of that index.
fn open_book(path: &Path) -> Result<Collection, Box<dyn std::error::Error>> {
    let config = CollectionConfig::new()
        .index(IndexSpec::field("name", "name"))
        .index(IndexSpec::new("age", |fields: &Fields| {
            fields
                .get("age")
                .filter(|value| matches!(value, Value::Number(_)))
                .cloned()
        }))
        .index(IndexSpec::new("birth", |fields: &Fields| {
            fields
                .get("birth")
                .filter(|value| matches!(value, Value::Date(_)))
                .cloned()
        }))
        .on_error(|err| eprintln!("background error: {err}"));
    Ok(Collection::open(
        Arc::new(DiskFileSystem::new()),
        path,
        config,
    )?)
}

fn person(name: &str, age: f64, birth: i64) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".into(), Value::from(name));
    fields.insert("age".into(), Value::from(age));
    fields.insert("birth".into(), Value::Date(birth));
    fields
}

fn date_millis(year: i32, month: u32, day: u32) -> Result<i64, Box<dyn std::error::Error>> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or("invalid calendar date")?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or("invalid calendar date")?;
    Ok(midnight.and_utc().timestamp_millis())
}

fn show(doc: &Document) -> String {
    let name = match doc.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => String::from("(unnamed)"),
    };
    match doc.get("age") {
        Some(Value::Number(age)) => format!("{name}, age {age}"),
        _ => name,
    }
}

fn settle(rx: &mpsc::Receiver<Option<String>>) -> Result<(), Box<dyn std::error::Error>> {
    match rx.recv()? {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn log_lines(path: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let bytes = DiskFileSystem::new().read_file(path)?;
    Ok(String::from_utf8(bytes)?
        .lines()
        .filter(|line| !line.is_empty())
        .count())
}
