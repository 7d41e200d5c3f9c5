//! SyncScheduler — per-entry debounce/cancel layer between the store and
//! the gateway.
//!
//! Turns local mutations into `update_entry_sets` calls under two rules:
//! field edits coalesce behind a trailing-edge timer, structural changes
//! flush immediately. A dispatch always supersedes the previous in-flight
//! write for the same entry (issue-time cancellation), so at most one write
//! per entry is outstanding at any time. No ordering is guaranteed across
//! entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::gateway::PersistenceGateway;
use crate::store::{FlushRequest, SessionStore};
use crate::types::EntryId;

// ============================================================================
// Options
// ============================================================================

/// Configuration for `SyncScheduler`.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Trailing-edge delay for debounced flushes in milliseconds
    /// (default: 2000).
    pub debounce_ms: Option<u64>,
}

const DEFAULT_DEBOUNCE_MS: u64 = 2000;

// ============================================================================
// SyncScheduler
// ============================================================================

/// Internal per-entry scheduling state.
struct EntrySlot {
    /// Pending trailing-edge timer, if any.
    debounce: Option<JoinHandle<()>>,
    /// Cancel handle for the write currently in flight, if any.
    in_flight_cancel: Option<oneshot::Sender<()>>,
    /// Bumped on every dispatch so a finishing task only clears its own
    /// in-flight state.
    epoch: u64,
}

impl EntrySlot {
    fn new() -> Self {
        Self {
            debounce: None,
            in_flight_cancel: None,
            epoch: 0,
        }
    }
}

#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<SessionStore>,
    debounce_ms: u64,
    slots: Mutex<HashMap<EntryId, Arc<Mutex<EntrySlot>>>>,
    disposed: AtomicBool,
}

impl SyncScheduler {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<SessionStore>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                store,
                debounce_ms: options.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
                slots: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Route a flush request reported by a store mutation.
    pub fn request(&self, request: FlushRequest) {
        match request {
            FlushRequest::None => {}
            FlushRequest::Debounced(id) => self.inner.debounce(id),
            FlushRequest::Immediate(id) => self.inner.dispatch(id),
        }
    }

    /// Flush an entry now, bypassing any pending timer.
    pub fn flush_now(&self, id: &EntryId) {
        self.inner.dispatch(id.clone());
    }

    /// Drop the entry's timer and cancel its in-flight write. Used when the
    /// entry is leaving the session and its state no longer needs to land.
    pub fn cancel_entry(&self, id: &EntryId) {
        let slot_arc = self.inner.slots.lock().remove(id);
        if let Some(slot_arc) = slot_arc {
            let mut slot = slot_arc.lock();
            if let Some(timer) = slot.debounce.take() {
                timer.abort();
            }
            if let Some(cancel) = slot.in_flight_cancel.take() {
                let _ = cancel.send(());
            }
        }
    }

    /// True while a trailing-edge timer is pending for the entry.
    pub fn pending_debounce(&self, id: &EntryId) -> bool {
        let slots = self.inner.slots.lock();
        slots.get(id).is_some_and(|slot_arc| {
            slot_arc
                .lock()
                .debounce
                .as_ref()
                .is_some_and(|timer| !timer.is_finished())
        })
    }

    /// True while a write for the entry is in flight.
    pub fn has_in_flight(&self, id: &EntryId) -> bool {
        let slots = self.inner.slots.lock();
        slots
            .get(id)
            .is_some_and(|slot_arc| slot_arc.lock().in_flight_cancel.is_some())
    }

    /// Abort all timers and cancel all in-flight writes. The scheduler
    /// ignores requests afterwards.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        let mut slots = self.inner.slots.lock();
        for (_, slot_arc) in slots.drain() {
            let mut slot = slot_arc.lock();
            if let Some(timer) = slot.debounce.take() {
                timer.abort();
            }
            if let Some(cancel) = slot.in_flight_cancel.take() {
                let _ = cancel.send(());
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Internal
// ----------------------------------------------------------------------------

impl Inner {
    /// Get or create the slot for an entry.
    ///
    /// Returns with no guard held, so callers can lock the slot and release
    /// it before any `.await`.
    fn slot(&self, id: &EntryId) -> Arc<Mutex<EntrySlot>> {
        let mut slots = self.slots.lock();
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(EntrySlot::new())))
            .clone()
    }

    /// Cancel-then-reschedule the entry's trailing-edge timer.
    fn debounce(self: &Arc<Self>, id: EntryId) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let slot_arc = self.slot(&id);

        let inner = self.clone();
        let timer_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(inner.debounce_ms)).await;
            inner.dispatch(timer_id);
        });

        let mut slot = slot_arc.lock();
        if let Some(previous) = slot.debounce.replace(handle) {
            previous.abort();
        }
    }

    /// Issue a write carrying the entry's current full set list.
    ///
    /// Cancels the pending timer and the previous in-flight write for the
    /// entry before dispatching. Entries still pending (their state rides
    /// on the creation payload and reconcile-on-ack) and entries no longer
    /// present are skipped.
    fn dispatch(self: &Arc<Self>, id: EntryId) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let Some(entry) = self.store.get(&id) else {
            debug!(entry = %id, "flush skipped: entry no longer present");
            return;
        };
        let remote_id = match &entry.id {
            EntryId::Remote(remote_id) => remote_id.clone(),
            EntryId::Local(_) => {
                debug!(entry = %id, "flush skipped: creation not yet acknowledged");
                return;
            }
        };
        let sets = entry.sets;

        let slot_arc = self.slot(&id);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let epoch = {
            let mut slot = slot_arc.lock();
            if let Some(timer) = slot.debounce.take() {
                timer.abort();
            }
            if let Some(previous) = slot.in_flight_cancel.replace(cancel_tx) {
                let _ = previous.send(());
            }
            slot.epoch += 1;
            slot.epoch
        };

        let inner = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel_rx => None,
                result = inner.gateway.update_entry_sets(&remote_id, &sets) => Some(result),
            };
            match outcome {
                None => trace!(entry = %id, "write superseded"),
                Some(Ok(_)) => trace!(entry = %id, "sets persisted"),
                Some(Err(error)) => {
                    // Log only: local state stays authoritative, the next
                    // flush carries the full list again.
                    warn!(entry = %id, %error, "set update failed");
                }
            }
            let mut slot = slot_arc.lock();
            if slot.epoch == epoch {
                slot.in_flight_cancel = None;
            }
        });
    }
}
