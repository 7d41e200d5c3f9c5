//! Process-local caches: per-exercise history snapshots and PR-dedup
//! markers.
//!
//! Both are explicit collaborators with explicit invalidation points —
//! finish clears them wholesale, single-entry removal clears its own keys.
//! No TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::PersistenceGateway;
use crate::types::{EntryId, HistorySnapshot};

// ============================================================================
// HistoryCache
// ============================================================================

/// Read-through cache mapping exercise name → [`HistorySnapshot`].
pub struct HistoryCache {
    gateway: Arc<dyn PersistenceGateway>,
    entries: Mutex<HashMap<String, HistorySnapshot>>,
}

impl HistoryCache {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot for `name`, fetched from the gateway on a miss.
    ///
    /// A failed fetch caches nothing; the next call retries.
    pub async fn get(&self, name: &str) -> Result<HistorySnapshot, GatewayError> {
        if let Some(snapshot) = self.entries.lock().get(name) {
            return Ok(snapshot.clone());
        }
        debug!(exercise = name, "history cache miss");
        let snapshot = self.gateway.fetch_history(name).await?;
        self.entries
            .lock()
            .insert(name.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    /// Cached snapshot without fetching.
    pub fn peek(&self, name: &str) -> Option<HistorySnapshot> {
        self.entries.lock().get(name).cloned()
    }

    /// Drop the snapshot for a single exercise.
    pub fn invalidate(&self, name: &str) {
        self.entries.lock().remove(name);
    }

    /// Drop every snapshot. Used after finish, when historical bests have
    /// changed for every exercise the session touched.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// PrMarkers
// ============================================================================

/// Dedup store for one-time PR celebrations, keyed by `(entry, set index)`.
///
/// Markers follow entries, not exercise names — invalidation here is
/// independent of `HistoryCache` invalidation.
#[derive(Default)]
pub struct PrMarkers {
    seen: Mutex<HashSet<(EntryId, usize)>>,
}

impl PrMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the marker; returns `true` exactly once per key.
    pub fn mark_once(&self, id: &EntryId, set_index: usize) -> bool {
        self.seen.lock().insert((id.clone(), set_index))
    }

    /// Move markers from a local id to the acknowledged remote id.
    pub fn rekey(&self, old: &EntryId, new: &EntryId) {
        let mut seen = self.seen.lock();
        let moved: Vec<usize> = seen
            .iter()
            .filter(|(id, _)| id == old)
            .map(|(_, index)| *index)
            .collect();
        if moved.is_empty() {
            return;
        }
        seen.retain(|(id, _)| id != old);
        for index in moved {
            seen.insert((new.clone(), index));
        }
    }

    /// Drop every marker belonging to an entry.
    pub fn forget_entry(&self, id: &EntryId) {
        self.seen.lock().retain(|(eid, _)| eid != id);
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
