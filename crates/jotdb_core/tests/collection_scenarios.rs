//! End-to-end scenarios: persistence, replay, compaction and crash
//! recovery against in-memory and disk file systems.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use jotdb_core::{
    Bounds, Collection, CollectionConfig, DiskFileSystem, Document, Fields, FileSystem,
    IndexSpec, MemoryFileSystem, StorageError, StorageResult, Value,
};

const DB: &str = "people.db";
const WAIT: Duration = Duration::from_secs(5);

fn person(name: &str, age: f64) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".to_string(), Value::from(name));
    fields.insert("age".to_string(), Value::Number(age));
    fields
}

fn open(fs: &Arc<MemoryFileSystem>, config: CollectionConfig) -> Collection {
    Collection::open(fs.clone(), DB, config).unwrap()
}

/// Adds a document and waits for its line to be on disk.
fn add_acked(people: &Collection, fields: Fields) -> Document {
    let (tx, rx) = mpsc::channel();
    let doc = people
        .add_with(fields, move |err| {
            tx.send(err).unwrap();
        })
        .unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap().is_none());
    doc
}

fn seed(fs: &MemoryFileSystem, path: &str, lines: &[&str]) {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs.append(Path::new(path), text.as_bytes(), false).unwrap();
}

fn log_text(fs: &MemoryFileSystem, path: &str) -> String {
    String::from_utf8(fs.read_file(Path::new(path)).unwrap()).unwrap()
}

fn live_lines(fs: &MemoryFileSystem, path: &str) -> usize {
    log_text(fs, path).lines().filter(|line| !line.is_empty()).count()
}

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn documents_survive_a_reopen() {
    let fs = Arc::new(MemoryFileSystem::new());
    let ada = {
        let people = open(&fs, CollectionConfig::new());
        people.add(person("grace", 45.0)).unwrap();
        people.add(person("ada", 36.0)).unwrap()
    };

    let people = open(&fs, CollectionConfig::new());
    assert_eq!(people.len(), 2);
    let reloaded = people.get(ada.id().as_str()).unwrap();
    assert_eq!(reloaded, ada);
}

#[test]
fn deletes_survive_a_reopen() {
    let fs = Arc::new(MemoryFileSystem::new());
    {
        let people = open(&fs, CollectionConfig::new().auto_compact(false));
        let doomed = people.add(person("grace", 45.0)).unwrap();
        people.add(person("ada", 36.0)).unwrap();
        people.delete(&doomed).unwrap();
    }

    // the delete travels as a marker line, not by rewriting the log
    assert!(log_text(&fs, DB).contains("$del$"));

    let people = open(&fs, CollectionConfig::new().auto_compact(false));
    assert_eq!(people.len(), 1);
    assert_eq!(people.docs()[0].get("name"), Some(&Value::from("ada")));
}

#[test]
fn superseded_lines_replay_to_the_latest_version() {
    let fs = Arc::new(MemoryFileSystem::new());
    seed(
        &fs,
        DB,
        &[
            r#"{"$id$":"a","n":1}"#,
            "",
            r#"{"$id$":"a","n":2}"#,
            r#"{"$id$":"b","n":3}"#,
            "",
        ],
    );

    let people = open(&fs, CollectionConfig::new().auto_compact(false));
    assert_eq!(people.len(), 2);
    let a = people.get("a").unwrap();
    assert_eq!(a.get("n"), Some(&Value::Number(2.0)));
}

#[test]
fn corrupt_lines_fail_the_open() {
    let fs = Arc::new(MemoryFileSystem::new());
    seed(&fs, DB, &[r#"{"$id$":"a","n":1}"#, "not json at all"]);

    let result = Collection::open(fs.clone(), DB, CollectionConfig::new());
    assert!(result.is_err());
}

#[test]
fn conflicting_unique_keys_fail_the_open() {
    let fs = Arc::new(MemoryFileSystem::new());
    seed(
        &fs,
        DB,
        &[r#"{"$id$":"a","name":"ada"}"#, r#"{"$id$":"b","name":"ada"}"#],
    );

    let config = CollectionConfig::new().index(IndexSpec::field("name", "name").unique());
    let err = Collection::open(fs.clone(), DB, config).unwrap_err();
    assert!(err.is_unique_violation());
}

#[test]
fn acknowledged_writes_survive_a_power_cut() {
    let fs = Arc::new(MemoryFileSystem::new());
    let people = open(&fs, CollectionConfig::new());
    let ada = add_acked(&people, person("ada", 36.0));

    // power cut: a fresh process sees only what reached the file
    let after_cut = Arc::new(fs.fork());
    let people = open(&after_cut, CollectionConfig::new());
    assert_eq!(people.len(), 1);
    assert!(people.get(ada.id().as_str()).is_some());
}

#[test]
fn compaction_rewrites_the_log_to_one_line_per_document() {
    let fs = Arc::new(MemoryFileSystem::new());
    let people = open(&fs, CollectionConfig::new().auto_compact(false));

    let mut grace = people.add(person("grace", 45.0)).unwrap();
    let doomed = people.add(person("gone", 1.0)).unwrap();
    grace.set("age", 46.0);
    people.save(&grace).unwrap();
    add_acked(&people, person("ada", 36.0));
    people.delete(&doomed).unwrap();
    assert!(live_lines(&fs, DB) > 2);

    let (compacted_tx, compacted_rx) = mpsc::channel();
    people.on_compact(move || {
        let _ = compacted_tx.send(());
    });
    let (done_tx, done_rx) = mpsc::channel();
    people
        .compact_with(move |err| {
            done_tx.send(err.map(|e| e.to_string())).unwrap();
        })
        .unwrap();

    assert!(done_rx.recv_timeout(WAIT).unwrap().is_none());
    compacted_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(live_lines(&fs, DB), 2);

    let people = open(&fs, CollectionConfig::new().auto_compact(false));
    assert_eq!(people.len(), 2);
    let reloaded = people.get(grace.id().as_str()).unwrap();
    assert_eq!(reloaded.get("age"), Some(&Value::Number(46.0)));
}

#[test]
fn compacting_twice_changes_nothing_more() {
    let fs = Arc::new(MemoryFileSystem::new());
    let people = open(&fs, CollectionConfig::new().auto_compact(false));
    let mut ada = people.add(person("ada", 36.0)).unwrap();
    people.add(person("grace", 45.0)).unwrap();
    ada.set("age", 37.0);
    people.save(&ada).unwrap();

    let compact = |people: &Collection| {
        let (done_tx, done_rx) = mpsc::channel();
        people
            .compact_with(move |err| {
                done_tx.send(err.map(|e| e.to_string())).unwrap();
            })
            .unwrap();
        assert!(done_rx.recv_timeout(WAIT).unwrap().is_none());
    };

    compact(&people);
    let first = log_text(&fs, DB);
    let docs = people.docs();

    compact(&people);
    assert_eq!(log_text(&fs, DB), first);
    assert_eq!(people.docs(), docs);
}

#[test]
fn a_noisy_log_compacts_itself_on_open() {
    let fs = Arc::new(MemoryFileSystem::new());
    seed(
        &fs,
        DB,
        &[
            r#"{"$id$":"a","n":1}"#,
            r#"{"$id$":"a","n":2}"#,
            r#"{"$id$":"b","n":3}"#,
            r#"{"$id$":"b","$op$":"$del$"}"#,
        ],
    );

    let people = open(&fs, CollectionConfig::new());
    assert_eq!(people.len(), 1);

    // the rewrite runs on the journal thread; wait for it to land
    assert!(eventually(|| {
        fs.read_file(Path::new(DB)).is_ok_and(|bytes| {
            bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count() == 1
        })
    }));
    assert_eq!(people.get("a").unwrap().get("n"), Some(&Value::Number(2.0)));
}

#[test]
fn an_interrupted_compaction_is_adopted_on_open() {
    let fs = Arc::new(MemoryFileSystem::new());
    // the log is gone, only the finished image and the doomed copy remain
    seed(&fs, "people.db~", &[r#"{"$id$":"a","n":1}"#]);
    seed(&fs, "people.db~del~", &[r#"{"$id$":"a","n":0}"#]);

    let people = open(&fs, CollectionConfig::new());
    assert_eq!(people.len(), 1);
    assert_eq!(people.get("a").unwrap().get("n"), Some(&Value::Number(1.0)));
    assert!(fs.contains(Path::new(DB)));
    assert!(!fs.contains(Path::new("people.db~")));
    assert!(!fs.contains(Path::new("people.db~del~")));
}

#[test]
fn a_failed_compaction_keeps_the_old_log() {
    let fs = Arc::new(MemoryFileSystem::new());
    let (err_tx, err_rx) = mpsc::channel();
    let config = CollectionConfig::new()
        .auto_compact(false)
        .on_error(move |err| {
            let _ = err_tx.send(err.to_string());
        });
    let people = open(&fs, config);
    add_acked(&people, person("ada", 36.0));
    let before = log_text(&fs, DB);

    fs.fail_next_renames(1);
    let (done_tx, done_rx) = mpsc::channel();
    people
        .compact_with(move |err| {
            done_tx.send(err.map(|e| e.to_string())).unwrap();
        })
        .unwrap();

    let failure = done_rx.recv_timeout(WAIT).unwrap().unwrap();
    assert!(failure.contains("injected rename failure"));
    assert!(err_rx.recv_timeout(WAIT).unwrap().contains("injected rename failure"));
    assert_eq!(log_text(&fs, DB), before);

    // the journal resumed: later writes still land
    add_acked(&people, person("grace", 45.0));
    assert_eq!(live_lines(&fs, DB), 2);
}

/// Delegates to a [`MemoryFileSystem`] but refuses to rename the
/// configured source path, leaving both files where they were.
struct RenameBlockingFs {
    inner: Arc<MemoryFileSystem>,
    blocked_source: PathBuf,
}

impl FileSystem for RenameBlockingFs {
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn append(&self, path: &Path, data: &[u8], sync: bool) -> StorageResult<()> {
        self.inner.append(path, data, sync)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        if from == self.blocked_source {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "blocked rename",
            )));
        }
        self.inner.rename(from, to)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        self.inner.remove(path)
    }
}

#[test]
fn a_failed_image_swap_restores_the_original_log() {
    let inner = Arc::new(MemoryFileSystem::new());
    // block the second rename of the swap, the one that moves the
    // fresh image over the log
    let fs: Arc<dyn FileSystem> = Arc::new(RenameBlockingFs {
        inner: Arc::clone(&inner),
        blocked_source: PathBuf::from("people.db~"),
    });

    let (err_tx, err_rx) = mpsc::channel();
    let config = CollectionConfig::new()
        .auto_compact(false)
        .on_error(move |err| {
            let _ = err_tx.send(err.to_string());
        });
    let people = Collection::open(fs, DB, config).unwrap();
    add_acked(&people, person("ada", 36.0));
    let before = log_text(&inner, DB);

    let (done_tx, done_rx) = mpsc::channel();
    people
        .compact_with(move |err| {
            done_tx.send(err.map(|e| e.to_string())).unwrap();
        })
        .unwrap();

    assert!(done_rx.recv_timeout(WAIT).unwrap().unwrap().contains("blocked rename"));
    err_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(log_text(&inner, DB), before);
    assert!(!inner.contains(Path::new("people.db~del~")));

    add_acked(&people, person("grace", 45.0));
    assert_eq!(live_lines(&inner, DB), 2);
}

#[test]
fn writes_issued_around_a_compaction_all_land() {
    let fs = Arc::new(MemoryFileSystem::new());
    {
        let people = open(&fs, CollectionConfig::new().auto_compact(false));
        for i in 0..5 {
            people.add(person(&format!("early-{i}"), f64::from(i))).unwrap();
        }
        people.compact().unwrap();
        for i in 5..10 {
            people.add(person(&format!("late-{i}"), f64::from(i))).unwrap();
        }
    }

    let people = open(&fs, CollectionConfig::new().auto_compact(false));
    assert_eq!(people.len(), 10);
}

#[test]
fn idle_fires_once_the_queue_drains() {
    let fs = Arc::new(MemoryFileSystem::new());
    let people = open(&fs, CollectionConfig::new());
    let (idle_tx, idle_rx) = mpsc::channel();
    people.on_idle(move || {
        let _ = idle_tx.send(());
    });

    people.add(person("ada", 36.0)).unwrap();
    idle_rx.recv_timeout(WAIT).unwrap();
    assert!(log_text(&fs, DB).contains("ada"));
}

#[test]
fn background_append_failures_reach_listener_and_callback() {
    let fs = Arc::new(MemoryFileSystem::new());
    let (err_tx, err_rx) = mpsc::channel();
    let config = CollectionConfig::new().on_error(move |err| {
        let _ = err_tx.send(err.to_string());
    });
    let people = open(&fs, config);

    fs.fail_next_appends(1);
    let (ack_tx, ack_rx) = mpsc::channel();
    let doc = people
        .add_with(person("ada", 36.0), move |err| {
            ack_tx.send(err.map(|e| e.to_string())).unwrap();
        })
        .unwrap();

    let failure = ack_rx.recv_timeout(WAIT).unwrap().unwrap();
    assert!(failure.contains("injected append failure"));
    assert!(err_rx.recv_timeout(WAIT).unwrap().contains("injected append failure"));

    // the document stays visible; the listener owns the divergence
    assert!(people.get(doc.id().as_str()).is_some());
}

#[test]
fn special_values_round_trip_through_the_log() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut fields = Fields::new();
    fields.insert("born".to_string(), Value::Date(-86_400_000));
    fields.insert(
        "tags".to_string(),
        Value::set(vec![Value::from("a"), Value::from("b")]),
    );
    fields.insert(
        "prefs".to_string(),
        Value::map(vec![(Value::from("theme"), Value::from("dark"))]),
    );
    fields.insert("pattern".to_string(), Value::Regex("^ab?c".to_string()));
    fields.insert("blank".to_string(), Value::Null);

    let ada = {
        let people = open(&fs, CollectionConfig::new());
        people.add(fields.clone()).unwrap()
    };

    let people = open(&fs, CollectionConfig::new());
    let reloaded = people.get(ada.id().as_str()).unwrap();
    assert_eq!(reloaded.fields(), &fields);
}

#[test]
fn unique_index_blocks_duplicates_after_a_reopen() {
    let fs = Arc::new(MemoryFileSystem::new());
    let config = || CollectionConfig::new().index(IndexSpec::field("name", "name").unique());
    {
        let people = open(&fs, config());
        people.add(person("ada", 36.0)).unwrap();
    }

    let people = open(&fs, config());
    let err = people.add(person("ada", 99.0)).unwrap_err();
    assert!(err.is_unique_violation());
}

#[test]
fn age_range_query_returns_matches_in_ascending_order() {
    let fs = Arc::new(MemoryFileSystem::new());
    let config = CollectionConfig::new().index(IndexSpec::field("age", "age"));
    let people = open(&fs, config);
    people.add(person("B", 40.0)).unwrap();
    people.add(person("A", 10.0)).unwrap();

    let hits = people
        .index("age")
        .unwrap()
        .between_key_bounds(&Bounds::new().gt(5).lte(40));
    let names: Vec<_> = hits
        .iter()
        .map(|doc| doc.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("A"), Value::from("B")]);
}

#[test]
fn disk_backed_collection_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB);
    let fs = Arc::new(DiskFileSystem::new());
    let config = || CollectionConfig::new().index(IndexSpec::field("age", "age"));

    {
        let people = Collection::open(fs.clone(), &path, config()).unwrap();
        people.add(person("ada", 36.0)).unwrap();
        people.add(person("grace", 45.0)).unwrap();
        people.add(person("kid", 9.0)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        people
            .compact_with(move |err| {
                done_tx.send(err.map(|e| e.to_string())).unwrap();
            })
            .unwrap();
        assert!(done_rx.recv_timeout(WAIT).unwrap().is_none());
    }

    let people = Collection::open(fs.clone(), &path, config()).unwrap();
    assert_eq!(people.len(), 3);

    let grown = people
        .index("age")
        .unwrap()
        .between_key_bounds(&Bounds::new().gte(Value::from(18)));
    let names: Vec<_> = grown
        .iter()
        .map(|doc| doc.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("ada"), Value::from("grace")]);
}
