//! Typed synchronous event emitter plus the engine's event payloads.
//!
//! Snapshot-on-emit semantics: a listener removed during an emission is
//! still called in that round, and one added during an emission waits for
//! the next. The internal lock is never held while a callback runs, so
//! listeners may call `on()`/`off()` freely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::EntryId;

/// Handle returned by [`EventEmitter::on`], accepted by [`EventEmitter::off`].
pub type ListenerId = u64;

/// Closure type for event listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

/// Typed synchronous event emitter. All methods take `&self`.
pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback`, returning an id for later removal.
    pub fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove the listener identified by `id`. Unknown ids are ignored.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Deliver `event` to every listener registered at the start of the call.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    /// Number of registered listeners.
    pub fn size(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Event payloads
// ============================================================================

/// Fired at most once per `(entry, set index)` when a completed set beats
/// the exercise's historical best. The UI layer hangs its one-time
/// celebration (toast, confetti) off this.
#[derive(Debug, Clone, PartialEq)]
pub struct PrEvent {
    pub entry_id: EntryId,
    pub exercise_name: String,
    pub set_index: usize,
    pub weight: f64,
    pub reps: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
