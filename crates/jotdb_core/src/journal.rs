//! Single-flight log writer.
//!
//! Every file write for one collection funnels through a journal: a
//! dedicated writer thread takes queued payloads one at a time,
//! appends them to the log file and reports completion through the
//! task's callback. At most one write is in flight at any moment and
//! queued work is served strictly in order, so log lines never
//! interleave.
//!
//! A journal can be put on **standby**. Queued-but-unwritten tasks
//! move into a backlog, and an exclusive procedure (compaction is the
//! one in this crate) gets the writer thread to itself together with a
//! [`ResumeToken`]. Work queued during standby accumulates behind the
//! backlog. [`resume`](Journal::resume) hands the queue back:
//! retaining the backlog replays it first and standby-time arrivals
//! after, while discarding drops only the backlog, for when the
//! procedure has made those writes obsolete.
//!
//! When the queue drains and nothing is in flight, the journal calls
//! its idle hook; collections forward that to their idle listeners.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use jotdb_storage::{FileSystem, StorageError};

use crate::error::CoreResult;

/// Token minted when the journal enters standby; required to resume.
///
/// Tokens are never reused, so a procedure holding yesterday's token
/// cannot quietly take over today's standby session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeToken(u64);

type WriteCallback = Box<dyn FnOnce(Option<StorageError>) + Send>;
type Preceder = Box<dyn FnOnce(JournalHandle, ResumeToken) + Send>;

struct Task {
    payload: String,
    sync: bool,
    done: WriteCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Normal,
    Standby {
        token: ResumeToken,
    },
}

#[derive(Default)]
struct JournalState {
    pending: VecDeque<Task>,
    backlog: VecDeque<Task>,
    preceders: VecDeque<Preceder>,
    mode: Mode,
    next_token: u64,
    shutdown: bool,
}

impl JournalState {
    /// Moves the queue into the backlog and mints a session token.
    /// Only called with an empty backlog: a resumed session always
    /// leaves it empty.
    fn enter_standby(&mut self) -> ResumeToken {
        let token = ResumeToken(self.next_token);
        self.next_token += 1;
        self.mode = Mode::Standby { token };
        debug_assert!(self.backlog.is_empty());
        std::mem::swap(&mut self.pending, &mut self.backlog);
        token
    }
}

struct JournalShared {
    state: Mutex<JournalState>,
    work: Condvar,
}

impl JournalShared {
    fn resume(&self, token: ResumeToken, discard_backlog: bool) {
        let mut state = self.state.lock();
        match state.mode {
            Mode::Standby { token: current } if current == token => {}
            Mode::Standby { token: current } => {
                panic!("stale resume token {token:?}, journal is on {current:?}");
            }
            Mode::Normal => panic!("resume called while journal is running"),
        }
        if discard_backlog {
            state.backlog.clear();
        } else {
            let mut merged = std::mem::take(&mut state.backlog);
            merged.append(&mut state.pending);
            state.pending = merged;
        }
        state.mode = Mode::Normal;
        debug!(discard_backlog, "journal resumed");
        self.work.notify_one();
    }
}

/// Owning side of the writer thread.
///
/// Dropping the journal drains whatever is still queued, then joins
/// the writer thread.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use jotdb_core::{FileSystem, Journal, MemoryFileSystem};
///
/// # fn main() -> jotdb_core::CoreResult<()> {
/// let fs = Arc::new(MemoryFileSystem::new());
/// let journal = Journal::new(Arc::clone(&fs) as Arc<dyn FileSystem>, "notes.log", || {})?;
///
/// journal.queue("{\"$id$\":\"a\"}\n".into(), false, |_err| {});
/// drop(journal); // drains the queue
///
/// assert!(fs.contains(Path::new("notes.log")));
/// # Ok(())
/// # }
/// ```
pub struct Journal {
    shared: Arc<JournalShared>,
    writer: Option<JoinHandle<()>>,
}

impl Journal {
    /// Spawns the writer thread for `path` on `fs`. `on_idle` runs on
    /// the writer thread whenever the queue drains.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the thread cannot be spawned.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        on_idle: impl Fn() + Send + 'static,
    ) -> CoreResult<Self> {
        let path = path.into();
        let shared = Arc::new(JournalShared {
            state: Mutex::new(JournalState::default()),
            work: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let writer = thread::Builder::new()
            .name("jotdb-journal".into())
            .spawn(move || writer_loop(&thread_shared, &*fs, &path, &on_idle))
            .map_err(StorageError::from)?;
        Ok(Self {
            shared,
            writer: Some(writer),
        })
    }

    /// Queues one payload for appending to the log file. `done` runs
    /// on the writer thread once the append finished, with the error
    /// if it failed.
    ///
    /// Payloads are written verbatim; callers include the trailing
    /// newline. `sync` asks for a durable flush before completion is
    /// reported.
    pub fn queue(
        &self,
        payload: String,
        sync: bool,
        done: impl FnOnce(Option<StorageError>) + Send + 'static,
    ) {
        let mut state = self.shared.state.lock();
        state.pending.push_back(Task {
            payload,
            sync,
            done: Box::new(done),
        });
        self.shared.work.notify_one();
    }

    /// Schedules `preceder` to run exclusively on the writer thread.
    ///
    /// Pending writes move into the backlog first, so the procedure
    /// observes a quiet file. The procedure receives a handle and the
    /// session token and must eventually call
    /// [`resume`](JournalHandle::resume) with that token. Several
    /// requests run as separate sessions, one after another.
    pub fn standby(&self, preceder: impl FnOnce(JournalHandle, ResumeToken) + Send + 'static) {
        let mut state = self.shared.state.lock();
        state.preceders.push_back(Box::new(preceder));
        self.shared.work.notify_one();
    }

    /// Ends a standby session and hands the queue back to the writer.
    ///
    /// With `discard_backlog` the writes parked at standby entry are
    /// dropped; work queued during the session is kept either way.
    ///
    /// # Panics
    ///
    /// Panics when `token` does not belong to the active standby
    /// session, or when the journal is not on standby at all.
    pub fn resume(&self, token: ResumeToken, discard_backlog: bool) {
        self.shared.resume(token, discard_backlog);
    }

    /// Returns a cloneable handle, mainly for standby procedures to
    /// resume with.
    #[must_use]
    pub fn handle(&self) -> JournalHandle {
        JournalHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.work.notify_one();
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("journal writer thread panicked");
            }
        }
    }
}

/// Cheap handle onto a journal, detached from its lifetime.
#[derive(Clone)]
pub struct JournalHandle {
    shared: Arc<JournalShared>,
}

impl JournalHandle {
    /// Same as [`Journal::resume`].
    ///
    /// # Panics
    ///
    /// Panics when `token` does not belong to the active standby
    /// session, or when the journal is not on standby at all.
    pub fn resume(&self, token: ResumeToken, discard_backlog: bool) {
        self.shared.resume(token, discard_backlog);
    }
}

enum Step {
    Write(Task),
    Exclusive(Preceder, ResumeToken),
    Idle,
    Exit,
}

fn writer_loop(
    shared: &Arc<JournalShared>,
    fs: &dyn FileSystem,
    path: &Path,
    on_idle: &(dyn Fn() + Send),
) {
    let mut did_work = false;
    loop {
        let step = {
            let mut state = shared.state.lock();
            loop {
                match state.mode {
                    Mode::Standby { token } => {
                        if let Some(preceder) = state.preceders.pop_front() {
                            break Step::Exclusive(preceder, token);
                        }
                        if state.shutdown {
                            break Step::Exit;
                        }
                        shared.work.wait(&mut state);
                    }
                    Mode::Normal => {
                        if !state.preceders.is_empty() {
                            let token = state.enter_standby();
                            debug!(?token, "journal standing by");
                        } else if let Some(task) = state.pending.pop_front() {
                            break Step::Write(task);
                        } else if state.shutdown {
                            break Step::Exit;
                        } else if did_work {
                            break Step::Idle;
                        } else {
                            shared.work.wait(&mut state);
                        }
                    }
                }
            }
        };

        match step {
            Step::Write(task) => {
                let outcome = fs.append(path, task.payload.as_bytes(), task.sync).err();
                if let Some(err) = &outcome {
                    warn!(path = %path.display(), error = %err, "journal write failed");
                }
                (task.done)(outcome);
                did_work = true;
            }
            Step::Exclusive(preceder, token) => {
                let handle = JournalHandle {
                    shared: Arc::clone(shared),
                };
                preceder(handle, token);
            }
            Step::Idle => {
                on_idle();
                did_work = false;
            }
            Step::Exit => return,
        }
    }
}
