//! Listener registries for collection events.
//!
//! A collection reports three things to interested callers: the
//! journal going idle, a finished compaction, and errors from
//! background writes. Listeners are plain closures held for the life
//! of the collection; there is no unsubscribe.

use parking_lot::RwLock;

use crate::error::CoreError;

type Listener = Box<dyn Fn() + Send + Sync>;
pub(crate) type ErrorListener = Box<dyn Fn(&CoreError) + Send + Sync>;

/// Fan-out hub for a collection's events.
///
/// Idle and compact notifications go to every registered listener.
/// Errors do too, but when nobody listens the error counts as
/// unhandled and the reporting side escalates; for background writes
/// that means panicking the writer thread.
#[derive(Default)]
pub(crate) struct EventHub {
    idle: RwLock<Vec<Listener>>,
    compact: RwLock<Vec<Listener>>,
    error: RwLock<Vec<ErrorListener>>,
}

impl EventHub {
    pub(crate) fn on_idle(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.idle.write().push(Box::new(listener));
    }

    pub(crate) fn on_compact(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.compact.write().push(Box::new(listener));
    }

    pub(crate) fn on_error(&self, listener: impl Fn(&CoreError) + Send + Sync + 'static) {
        self.error.write().push(Box::new(listener));
    }

    pub(crate) fn on_error_boxed(&self, listener: ErrorListener) {
        self.error.write().push(listener);
    }

    pub(crate) fn emit_idle(&self) {
        for listener in self.idle.read().iter() {
            listener();
        }
    }

    pub(crate) fn emit_compact(&self) {
        for listener in self.compact.read().iter() {
            listener();
        }
    }

    /// Delivers an error to listeners, returning whether anyone was
    /// listening.
    pub(crate) fn emit_error(&self, err: &CoreError) -> bool {
        let listeners = self.error.read();
        for listener in listeners.iter() {
            listener(err);
        }
        !listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn listeners_receive_events() {
        let hub = EventHub::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&hits);
        hub.on_idle(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        let count = Arc::clone(&hits);
        hub.on_compact(move || {
            count.fetch_add(10, Ordering::SeqCst);
        });

        hub.emit_idle();
        hub.emit_idle();
        hub.emit_compact();
        assert_eq!(hits.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn emit_error_reports_whether_handled() {
        let hub = EventHub::default();
        assert!(!hub.emit_error(&CoreError::NotPersistent));

        hub.on_error(|_err| {});
        assert!(hub.emit_error(&CoreError::NotPersistent));
    }

    #[test]
    fn listeners_observe_the_error_they_were_given() {
        let hub = EventHub::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&seen);
        hub.on_error(move |err| {
            assert!(matches!(err, CoreError::NotPersistent));
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hub.emit_error(&CoreError::NotPersistent));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
