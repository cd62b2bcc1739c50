//! The collection: an in-memory document map backed by an append-only
//! journal and any number of ordered indices.
//!
//! ## Concurrency
//!
//! All state sits behind a single [`parking_lot::RwLock`]. A mutation
//! holds the write lock while it validates, applies, and hands the
//! journal its payload, so the order of lines on disk always matches
//! the order in which the map changed. The journal writes on its own
//! thread; completion callbacks run there and should stay short.
//!
//! ## Durability
//!
//! A mutation is visible to readers the moment the call returns and
//! becomes durable once the journal reports the append through the
//! `_with` callback. Compaction rewrites the log as one line per live
//! document while new writes queue up behind it, then replaces the
//! old file with two renames so a crash at any point leaves a log
//! that [`Collection::open`] can recover.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, warn};

use jotdb_codec::{Fields, Record, Value};
use jotdb_storage::{FileSystem, StorageError};

use crate::config::{CollectionConfig, IdGen};
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::events::EventHub;
use crate::index::{Bounds, Index, IndexSpec, KeyBounds};
use crate::journal::{Journal, JournalHandle, ResumeToken};
use crate::types::DocId;

type Done = Box<dyn FnOnce(Option<CoreError>) + Send>;

/// A schema-less document collection.
///
/// A collection keeps every document in memory and, when opened with
/// [`Collection::open`], mirrors each change to an append-only log of
/// JSON lines. Cloning a `Collection` is cheap and yields a second
/// handle to the same store.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use jotdb_core::{Collection, CollectionConfig, IndexSpec, MemoryFileSystem, Value};
///
/// let fs = Arc::new(MemoryFileSystem::new());
/// let config = CollectionConfig::new().index(IndexSpec::field("name", "name"));
/// let people = Collection::open(fs, "people.db", config)?;
///
/// let mut fields = jotdb_core::Fields::new();
/// fields.insert("name".into(), Value::from("Ada"));
/// let doc = people.add(fields)?;
///
/// let by_name = people.index("name")?;
/// assert_eq!(by_name.search_by_key(&Value::from("Ada"))[0].id(), doc.id());
/// # Ok::<(), jotdb_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    hub: Arc<EventHub>,
    id_gen: IdGen,
    state: RwLock<CollectionState>,
    persist: Option<Persistence>,
}

struct Persistence {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    journal: Journal,
}

struct CollectionState {
    docs: BTreeMap<DocId, Fields>,
    indices: Vec<Index>,
}

impl Collection {
    /// Creates a collection that lives purely in memory.
    ///
    /// Transient collections accept the full API; completion
    /// callbacks run inline since there is nothing to persist, and
    /// [`Collection::compact`] reports [`CoreError::NotPersistent`].
    ///
    /// # Errors
    ///
    /// Returns an error when two configured indices share a name.
    pub fn transient(config: CollectionConfig) -> CoreResult<Self> {
        let CollectionConfig {
            indices,
            id_gen,
            on_error,
            ..
        } = config;
        let indices = build_indices(indices)?;
        let hub = Arc::new(EventHub::default());
        if let Some(listener) = on_error {
            hub.on_error_boxed(listener);
        }
        Ok(Self {
            inner: Arc::new(CollectionInner {
                hub,
                id_gen,
                state: RwLock::new(CollectionState {
                    docs: BTreeMap::new(),
                    indices,
                }),
                persist: None,
            }),
        })
    }

    /// Opens the collection stored in the log at `path`, creating an
    /// empty one when no file exists yet.
    ///
    /// The whole log is replayed: later lines for an id supersede
    /// earlier ones and delete markers drop the id. When the replay
    /// shows superseded lines and the configuration keeps
    /// `auto_compact` on, a compaction is scheduled right away. A
    /// temporary image left behind by a compaction that was cut short
    /// is adopted as the log before reading.
    ///
    /// # Errors
    ///
    /// Returns an error when the log cannot be read, when any line
    /// fails to decode, when two indices share a name, or when the
    /// replayed documents violate a unique index.
    pub fn open(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        config: CollectionConfig,
    ) -> CoreResult<Self> {
        let path = path.into();
        let CollectionConfig {
            indices,
            auto_compact,
            id_gen,
            on_error,
        } = config;
        let mut indices = build_indices(indices)?;
        let hub = Arc::new(EventHub::default());
        if let Some(listener) = on_error {
            hub.on_error_boxed(listener);
        }

        let bytes = read_log(&*fs, &path)?;
        let text = std::str::from_utf8(&bytes).map_err(jotdb_codec::CodecError::from)?;

        let mut docs = BTreeMap::new();
        let mut already_compact = true;
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            match jotdb_codec::deserialize(line)? {
                Record::Doc { id, fields } => {
                    if docs.insert(DocId::new(id), fields).is_some() {
                        already_compact = false;
                    }
                }
                Record::Delete { id } => {
                    docs.remove(id.as_str());
                    already_compact = false;
                }
            }
        }

        for index in &mut indices {
            for (id, fields) in &docs {
                index.check_add(fields)?;
                index.add(id, fields);
            }
        }

        debug!(
            path = %path.display(),
            docs = docs.len(),
            already_compact,
            "collection loaded"
        );

        let journal = Journal::new(Arc::clone(&fs), path.clone(), {
            let hub = Arc::clone(&hub);
            move || hub.emit_idle()
        })?;

        let collection = Self {
            inner: Arc::new(CollectionInner {
                hub,
                id_gen,
                state: RwLock::new(CollectionState { docs, indices }),
                persist: Some(Persistence { fs, path, journal }),
            }),
        };

        if auto_compact && !already_compact {
            debug!("log carries superseded lines, scheduling compaction");
            collection.compact()?;
        }

        Ok(collection)
    }

    /// Adds a new document built from `fields`, assigning it a fresh
    /// id from the configured generator.
    ///
    /// The document is visible to readers and indices as soon as this
    /// returns; the append to disk happens in the background. Use
    /// [`Collection::add_with`] to learn when the line is on disk.
    ///
    /// # Errors
    ///
    /// Returns an error when a unique index already holds one of the
    /// document's keys or when the fields cannot be encoded. Nothing
    /// is applied in that case.
    pub fn add(&self, fields: Fields) -> CoreResult<Document> {
        self.add_all(vec![fields], None)
            .map(|mut docs| docs.swap_remove(0))
    }

    /// Like [`Collection::add`], but also runs `done` once the append
    /// completes (inline for transient collections).
    ///
    /// # Errors
    ///
    /// Same as [`Collection::add`]; `done` is dropped unused when the
    /// call itself fails.
    pub fn add_with(
        &self,
        fields: Fields,
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<Document> {
        self.add_all(vec![fields], Some(Box::new(done)))
            .map(|mut docs| docs.swap_remove(0))
    }

    /// Adds every document in `batch`, in order, as one journal entry.
    ///
    /// # Errors
    ///
    /// Stops at the first document that fails validation: documents
    /// before it stay applied and queued for the log, the offender
    /// and everything after it are abandoned, and the error is
    /// returned.
    pub fn add_batch(&self, batch: Vec<Fields>) -> CoreResult<Vec<Document>> {
        self.add_all(batch, None)
    }

    /// Like [`Collection::add_batch`], with a completion callback for
    /// the batch's single append.
    ///
    /// An empty batch completes immediately. When the batch fails
    /// part-way the callback is dropped unused; the documents already
    /// applied are still written.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::add_batch`].
    pub fn add_batch_with(
        &self,
        batch: Vec<Fields>,
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<Vec<Document>> {
        self.add_all(batch, Some(Box::new(done)))
    }

    /// Writes back a document obtained from this collection, or
    /// restores one that was deleted.
    ///
    /// Saving is an upsert on the document's id: indices move the id
    /// from its old key to the new one, and ids whose key is
    /// unchanged keep their position within the key's slot.
    ///
    /// # Errors
    ///
    /// Returns an error when the new fields would violate a unique
    /// index (the same document keeping its key is fine) or when the
    /// fields cannot be encoded.
    pub fn save(&self, doc: &Document) -> CoreResult<()> {
        self.save_all(std::slice::from_ref(doc), None)
    }

    /// Like [`Collection::save`], but also runs `done` once the
    /// append completes.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::save`].
    pub fn save_with(
        &self,
        doc: &Document,
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<()> {
        self.save_all(std::slice::from_ref(doc), Some(Box::new(done)))
    }

    /// Saves every document in `docs`, in order, as one journal entry.
    ///
    /// # Errors
    ///
    /// Stops at the first document that fails validation, keeping the
    /// ones before it, like [`Collection::add_batch`].
    pub fn save_batch(&self, docs: &[Document]) -> CoreResult<()> {
        self.save_all(docs, None)
    }

    /// Like [`Collection::save_batch`], with a completion callback.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::save_batch`].
    pub fn save_batch_with(
        &self,
        docs: &[Document],
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<()> {
        self.save_all(docs, Some(Box::new(done)))
    }

    /// Deletes a document, writing a delete marker to the log.
    ///
    /// Deleting an id that is already gone still writes the marker,
    /// so replaying the log converges on the same state.
    ///
    /// # Errors
    ///
    /// Returns an error only when the delete marker cannot be
    /// encoded.
    pub fn delete(&self, doc: &Document) -> CoreResult<()> {
        self.delete_all(std::slice::from_ref(doc), None)
    }

    /// Like [`Collection::delete`], but also runs `done` once the
    /// append completes.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::delete`].
    pub fn delete_with(
        &self,
        doc: &Document,
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<()> {
        self.delete_all(std::slice::from_ref(doc), Some(Box::new(done)))
    }

    /// Deletes every document in `docs` as one journal entry.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::delete`].
    pub fn delete_batch(&self, docs: &[Document]) -> CoreResult<()> {
        self.delete_all(docs, None)
    }

    /// Like [`Collection::delete_batch`], with a completion callback.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::delete_batch`].
    pub fn delete_batch_with(
        &self,
        docs: &[Document],
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<()> {
        self.delete_all(docs, Some(Box::new(done)))
    }

    fn add_all(&self, batch: Vec<Fields>, done: Option<Done>) -> CoreResult<Vec<Document>> {
        let mut state = self.inner.state.write();
        let mut created = Vec::with_capacity(batch.len());
        let mut payload = String::new();
        let mut outcome = Ok(());
        for fields in batch {
            if let Err(err) = state.check_add(&fields) {
                outcome = Err(err);
                break;
            }
            let id = state.fresh_id(&self.inner.id_gen);
            let line = match jotdb_codec::serialize(id.as_str(), &fields) {
                Ok(line) => line,
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            };
            state.apply_add(&id, &fields);
            payload.push_str(&line);
            payload.push('\n');
            created.push(Document::new(id, fields));
        }
        let complete_now = self.enqueue(payload, outcome.is_ok(), done);
        drop(state);
        if let Some(done) = complete_now {
            done(None);
        }
        outcome?;
        Ok(created)
    }

    fn save_all(&self, docs: &[Document], done: Option<Done>) -> CoreResult<()> {
        let mut state = self.inner.state.write();
        let mut payload = String::new();
        let mut outcome = Ok(());
        for doc in docs {
            if let Err(err) = state.check_save(doc.id(), doc.fields()) {
                outcome = Err(err);
                break;
            }
            let line = match jotdb_codec::serialize(doc.id().as_str(), doc.fields()) {
                Ok(line) => line,
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            };
            state.apply_save(doc.id(), doc.fields());
            payload.push_str(&line);
            payload.push('\n');
        }
        let complete_now = self.enqueue(payload, outcome.is_ok(), done);
        drop(state);
        if let Some(done) = complete_now {
            done(None);
        }
        outcome
    }

    fn delete_all(&self, docs: &[Document], done: Option<Done>) -> CoreResult<()> {
        let mut state = self.inner.state.write();
        let mut payload = String::new();
        let mut outcome: CoreResult<()> = Ok(());
        for doc in docs {
            let line = match jotdb_codec::serialize_delete(doc.id().as_str()) {
                Ok(line) => line,
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            };
            state.apply_delete(doc.id());
            payload.push_str(&line);
            payload.push('\n');
        }
        let complete_now = self.enqueue(payload, outcome.is_ok(), done);
        drop(state);
        if let Some(done) = complete_now {
            done(None);
        }
        outcome
    }

    /// Hands `payload` to the journal while the caller still holds
    /// the state lock, so queue order matches apply order. Returns a
    /// callback the caller must invoke after releasing the lock.
    fn enqueue(&self, payload: String, ok: bool, done: Option<Done>) -> Option<Done> {
        let done = if ok { done } else { None };
        if payload.is_empty() {
            return done;
        }
        match &self.inner.persist {
            Some(persist) => {
                let hub = Arc::clone(&self.inner.hub);
                persist.journal.queue(payload, false, write_completion(hub, done));
                None
            }
            None => done,
        }
    }

    /// Rewrites the log as one line per live document.
    ///
    /// The journal finishes its in-flight write, then runs the
    /// compaction while later writes queue up. The fresh image is
    /// written to `<path>~`, fsynced, and swapped in with two
    /// renames; queued writes whose data the image already covers are
    /// discarded, the rest replay onto the new file. On success the
    /// compact event fires. On failure the old file stays
    /// authoritative, every queued write replays, and the error goes
    /// to the error listeners.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotPersistent`] for transient
    /// collections. Failures of the rewrite itself are reported
    /// through the error listeners (or [`Collection::compact_with`]'s
    /// callback), not from this call.
    pub fn compact(&self) -> CoreResult<()> {
        self.compact_inner(None)
    }

    /// Like [`Collection::compact`], but also runs `done` when the
    /// compaction finishes or fails.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::compact`].
    pub fn compact_with(
        &self,
        done: impl FnOnce(Option<CoreError>) + Send + 'static,
    ) -> CoreResult<()> {
        self.compact_inner(Some(Box::new(done)))
    }

    fn compact_inner(&self, done: Option<Done>) -> CoreResult<()> {
        let persist = self.inner.persist.as_ref().ok_or(CoreError::NotPersistent)?;
        let weak = Arc::downgrade(&self.inner);
        persist.journal.standby(move |journal, token| {
            run_compaction(&weak, &journal, token, done);
        });
        Ok(())
    }

    /// Registers additional indices over the current contents.
    ///
    /// Every index is built completely before any of them is
    /// registered, so a failure leaves the collection exactly as it
    /// was.
    ///
    /// # Errors
    ///
    /// Returns an error when a name is already taken or when existing
    /// documents violate a new unique index.
    pub fn add_indices(&self, specs: Vec<IndexSpec>) -> CoreResult<()> {
        let mut state = self.inner.state.write();
        for (position, spec) in specs.iter().enumerate() {
            let taken = state.indices.iter().any(|index| index.name() == spec.name())
                || specs[..position].iter().any(|earlier| earlier.name() == spec.name());
            if taken {
                return Err(CoreError::index_exists(spec.name()));
            }
        }
        let mut built = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut index = Index::from_spec(spec);
            for (id, fields) in &state.docs {
                index.check_add(fields)?;
                index.add(id, fields);
            }
            built.push(index);
        }
        state.indices.append(&mut built);
        Ok(())
    }

    /// Returns a query handle for the index named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownIndex`] when no such index is
    /// registered.
    pub fn index(&self, name: &str) -> CoreResult<IndexQuery> {
        let state = self.inner.state.read();
        if state.find_index(name).is_none() {
            return Err(CoreError::unknown_index(name));
        }
        Ok(IndexQuery {
            collection: self.clone(),
            name: name.to_string(),
        })
    }

    /// Looks up a document by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Document> {
        let state = self.inner.state.read();
        state
            .docs
            .get_key_value(id)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.read().docs.len()
    }

    /// Whether the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every document, ordered by id.
    #[must_use]
    pub fn docs(&self) -> Vec<Document> {
        let state = self.inner.state.read();
        state
            .docs
            .iter()
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect()
    }

    /// Runs `listener` every time the journal drains its queue.
    pub fn on_idle(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.hub.on_idle(listener);
    }

    /// Runs `listener` after each successful compaction.
    pub fn on_compact(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.hub.on_compact(listener);
    }

    /// Runs `listener` for every background failure: appends that
    /// fail after their call returned, and compactions that fail.
    ///
    /// With no listener registered, a background failure panics the
    /// journal thread, on the grounds that losing writes silently is
    /// worse. Registering any listener takes ownership of that
    /// decision.
    pub fn on_error(&self, listener: impl Fn(&CoreError) + Send + Sync + 'static) {
        self.inner.hub.on_error(listener);
    }

    /// The backing file, when the collection is persistent.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.persist.as_ref().map(|persist| persist.path.as_path())
    }

    /// Whether changes are mirrored to a log file.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.inner.persist.is_some()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl CollectionState {
    fn check_add(&self, fields: &Fields) -> CoreResult<()> {
        for index in &self.indices {
            index.check_add(fields)?;
        }
        Ok(())
    }

    fn check_save(&self, id: &DocId, fields: &Fields) -> CoreResult<()> {
        for index in &self.indices {
            index.check_save(id, fields)?;
        }
        Ok(())
    }

    fn apply_add(&mut self, id: &DocId, fields: &Fields) {
        for index in &mut self.indices {
            index.add(id, fields);
        }
        self.docs.insert(id.clone(), fields.clone());
    }

    fn apply_save(&mut self, id: &DocId, fields: &Fields) {
        if self.docs.contains_key(id) {
            for index in &mut self.indices {
                index.update(id, fields);
            }
        } else {
            for index in &mut self.indices {
                index.add(id, fields);
            }
        }
        self.docs.insert(id.clone(), fields.clone());
    }

    fn apply_delete(&mut self, id: &DocId) {
        for index in &mut self.indices {
            index.delete(id);
        }
        self.docs.remove(id);
    }

    fn fresh_id(&self, id_gen: &IdGen) -> DocId {
        loop {
            let candidate = DocId::new(id_gen());
            if !self.docs.contains_key(&candidate) {
                return candidate;
            }
            debug!(id = %candidate, "generated id already taken, drawing again");
        }
    }

    fn find_index(&self, name: &str) -> Option<&Index> {
        self.indices.iter().find(|index| index.name() == name)
    }
}

/// Adapts a journal completion into the collection's error contract:
/// failures reach both the per-write callback and the error
/// listeners, and panic the journal thread when nobody listens.
fn write_completion(
    hub: Arc<EventHub>,
    done: Option<Done>,
) -> impl FnOnce(Option<StorageError>) + Send + 'static {
    move |err| match err {
        None => {
            if let Some(done) = done {
                done(None);
            }
        }
        Some(err) => {
            let err = CoreError::from(err);
            let handled = hub.emit_error(&err);
            let message = err.to_string();
            if let Some(done) = done {
                done(Some(err));
            }
            if !handled {
                panic!("unhandled write error: {message}");
            }
        }
    }
}

fn run_compaction(
    inner: &Weak<CollectionInner>,
    journal: &JournalHandle,
    token: ResumeToken,
    done: Option<Done>,
) {
    let Some(inner) = inner.upgrade() else {
        journal.resume(token, false);
        if let Some(done) = done {
            done(None);
        }
        return;
    };
    let Some(persist) = inner.persist.as_ref() else {
        journal.resume(token, false);
        if let Some(done) = done {
            done(None);
        }
        return;
    };

    match try_compaction(&inner, persist) {
        Ok(()) => {
            // the image covers everything queued before the standby
            journal.resume(token, true);
            debug!(path = %persist.path.display(), "log compacted");
            if let Some(done) = done {
                done(None);
            }
            inner.hub.emit_compact();
        }
        Err(err) => {
            journal.resume(token, false);
            warn!(path = %persist.path.display(), error = %err, "compaction failed");
            let handled = inner.hub.emit_error(&err);
            let message = err.to_string();
            if let Some(done) = done {
                done(Some(err));
            }
            if !handled {
                panic!("unhandled compaction error: {message}");
            }
        }
    }
}

fn try_compaction(inner: &Arc<CollectionInner>, persist: &Persistence) -> CoreResult<()> {
    let path = &persist.path;
    let temp = temp_path(path);
    let doomed = doomed_path(path);

    let payload = {
        let state = inner.state.read();
        let mut payload = String::with_capacity(state.docs.len() * 64);
        for (id, fields) in &state.docs {
            let line = jotdb_codec::serialize(id.as_str(), fields)?;
            payload.push_str(&line);
            payload.push('\n');
        }
        payload
    };

    // an interrupted run may have left a partial image behind
    remove_if_present(&*persist.fs, &temp)?;
    persist.fs.append(&temp, payload.as_bytes(), true)?;

    remove_if_present(&*persist.fs, &doomed)?;
    persist.fs.rename(path, &doomed)?;
    if let Err(err) = persist.fs.rename(&temp, path) {
        // put the original back so the log stays authoritative
        if let Err(undo) = persist.fs.rename(&doomed, path) {
            warn!(path = %path.display(), error = %undo, "could not restore the original log");
        }
        return Err(err.into());
    }
    if let Err(err) = persist.fs.remove(&doomed) {
        if !err.is_not_found() {
            warn!(path = %doomed.display(), error = %err, "could not remove compaction backup");
        }
    }
    Ok(())
}

/// Reads the log, adopting the image of an interrupted compaction
/// when the log itself is gone. The original file only disappears
/// after the replacement image was written and fsynced, so the image
/// is complete whenever this branch is taken.
fn read_log(fs: &dyn FileSystem, path: &Path) -> CoreResult<Vec<u8>> {
    match fs.read_file(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.is_not_found() => {
            let temp = temp_path(path);
            match fs.read_file(&temp) {
                Ok(bytes) => {
                    warn!(
                        path = %path.display(),
                        "adopting the image left by an interrupted compaction"
                    );
                    fs.rename(&temp, path)?;
                    let doomed = doomed_path(path);
                    if let Err(err) = fs.remove(&doomed) {
                        if !err.is_not_found() {
                            warn!(error = %err, "could not remove compaction backup");
                        }
                    }
                    Ok(bytes)
                }
                Err(temp_err) if temp_err.is_not_found() => Ok(Vec::new()),
                Err(temp_err) => Err(temp_err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn remove_if_present(fs: &dyn FileSystem, path: &Path) -> CoreResult<()> {
    match fs.remove(path) {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push("~");
    PathBuf::from(raw)
}

fn doomed_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push("~del~");
    PathBuf::from(raw)
}

fn build_indices(specs: Vec<IndexSpec>) -> CoreResult<Vec<Index>> {
    let mut indices: Vec<Index> = Vec::with_capacity(specs.len());
    for spec in specs {
        if indices.iter().any(|index| index.name() == spec.name()) {
            return Err(CoreError::index_exists(spec.name()));
        }
        indices.push(Index::from_spec(spec));
    }
    Ok(indices)
}

/// Read access to one index of a collection.
///
/// Obtained from [`Collection::index`]. Every query takes the
/// collection's read lock for its duration and resolves ids to full
/// documents, dropping ids whose document vanished in between.
#[derive(Clone, Debug)]
pub struct IndexQuery {
    collection: Collection,
    name: String,
}

impl IndexQuery {
    /// The index name this handle queries.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All documents whose key compares equal to `key`, in insertion
    /// order within the key.
    #[must_use]
    pub fn search_by_key(&self, key: &Value) -> Vec<Document> {
        self.resolve(|index| index.search_by_key(key))
    }

    /// Like [`IndexQuery::search_by_key`], but the key is derived from
    /// `example` through the index's key function. An example without
    /// a key matches nothing.
    #[must_use]
    pub fn search(&self, example: &Fields) -> Vec<Document> {
        self.resolve(|index| index.search(example))
    }

    /// All documents whose key falls inside `bounds`, in key order.
    #[must_use]
    pub fn between_key_bounds(&self, bounds: &KeyBounds) -> Vec<Document> {
        self.resolve(|index| index.between_key_bounds(bounds))
    }

    /// Like [`IndexQuery::between_key_bounds`], but bounds are given
    /// as example documents run through the index's key function.
    /// Bounds whose example yields no key are dropped.
    #[must_use]
    pub fn between_bounds(&self, bounds: Bounds<Fields>) -> Vec<Document> {
        self.resolve(|index| index.between_bounds(bounds))
    }

    /// The documents this index retains without a key, in insertion
    /// order. Empty unless the index was configured to retain them.
    #[must_use]
    pub fn unkeyed(&self) -> Vec<Document> {
        self.resolve(Index::unkeyed_ids)
    }

    fn resolve(&self, query: impl FnOnce(&Index) -> Vec<DocId>) -> Vec<Document> {
        let state = self.collection.inner.state.read();
        let Some(index) = state.find_index(&self.name) else {
            return Vec::new();
        };
        query(index)
            .into_iter()
            .filter_map(|id| {
                let fields = state.docs.get(&id)?;
                Some(Document::new(id, fields.clone()))
            })
            .collect()
    }
}
