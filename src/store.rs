//! SessionStore — the in-memory source of truth for the active session.
//!
//! All mutations are synchronous and local; the store never performs IO.
//! Each mutation reports the flush the caller should schedule, keeping the
//! side-effect decision in one place.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::{EntryId, EntryStatus, ExerciseEntry, SetRecord};

// ============================================================================
// Actions and side-effect descriptors
// ============================================================================

/// Side effect requested by a mutation. Routed to the `SyncScheduler` by
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushRequest {
    None,
    /// Free-text field edit — coalesce within the debounce window.
    Debounced(EntryId),
    /// Structural change — flush now, cancelling any pending debounce.
    Immediate(EntryId),
}

/// A field edit on a single set.
#[derive(Debug, Clone, PartialEq)]
pub enum SetField {
    Weight(Option<f64>),
    Reps(Option<u32>),
}

/// Mutations applied to the store.
#[derive(Debug, Clone)]
pub enum SessionAction {
    AddEntry(ExerciseEntry),
    /// Swap a pending entry to its acknowledged identity.
    ReplaceEntry {
        local: EntryId,
        persisted: ExerciseEntry,
    },
    RemoveEntry(EntryId),
    UpdateSetField {
        id: EntryId,
        index: usize,
        field: SetField,
    },
    ToggleCompletion {
        id: EntryId,
        index: usize,
    },
    /// Append a set prefilled from the previous one.
    AddSet(EntryId),
    RemoveSet {
        id: EntryId,
        index: usize,
    },
    /// Complete every filled set, or clear all when all are completed.
    ToggleAllCompletion(EntryId),
}

// ============================================================================
// SessionStore
// ============================================================================

/// Ordered collection of active exercise entries.
pub struct SessionStore {
    entries: Mutex<Vec<ExerciseEntry>>,
    next_local_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_local_id: AtomicU64::new(1),
        }
    }

    /// Fresh local id for an optimistic insert.
    pub fn next_local_id(&self) -> EntryId {
        EntryId::Local(self.next_local_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Apply a mutation and report the flush the caller should schedule.
    ///
    /// Unknown ids and out-of-range indexes are silent no-ops: the UI may
    /// race against a removal it has already rendered. Completing an
    /// unfilled set and editing a completed set are refused the same way.
    pub fn apply(&self, action: SessionAction) -> FlushRequest {
        let mut entries = self.entries.lock();
        match action {
            SessionAction::AddEntry(entry) => {
                entries.push(entry);
                FlushRequest::None
            }

            SessionAction::ReplaceEntry { local, persisted } => {
                let Some(entry) = entries.iter_mut().find(|e| e.id == local) else {
                    return FlushRequest::None;
                };
                // Optimistic local edits win over the creation echo: keep
                // the local set list, take the remote identity.
                let diverged = entry.sets != persisted.sets;
                entry.id = persisted.id.clone();
                entry.status = EntryStatus::Persisted;
                entry.meta = persisted.meta;
                if diverged {
                    FlushRequest::Immediate(persisted.id)
                } else {
                    FlushRequest::None
                }
            }

            SessionAction::RemoveEntry(id) => {
                entries.retain(|e| e.id != id);
                FlushRequest::None
            }

            SessionAction::UpdateSetField { id, index, field } => {
                let Some(set) = set_at(&mut entries, &id, index) else {
                    return FlushRequest::None;
                };
                if set.completed {
                    return FlushRequest::None;
                }
                match field {
                    SetField::Weight(weight) => set.weight = weight,
                    SetField::Reps(reps) => set.reps = reps,
                }
                FlushRequest::Debounced(id)
            }

            SessionAction::ToggleCompletion { id, index } => {
                let Some(set) = set_at(&mut entries, &id, index) else {
                    return FlushRequest::None;
                };
                if !set.completed && !set.is_filled() {
                    return FlushRequest::None;
                }
                set.completed = !set.completed;
                FlushRequest::Immediate(id)
            }

            SessionAction::AddSet(id) => {
                let Some(entry) = entry_at(&mut entries, &id) else {
                    return FlushRequest::None;
                };
                let prefill = entry
                    .sets
                    .last()
                    .map(|prev| SetRecord {
                        weight: prev.weight,
                        reps: prev.reps,
                        completed: false,
                    })
                    .unwrap_or_default();
                entry.sets.push(prefill);
                FlushRequest::Immediate(id)
            }

            SessionAction::RemoveSet { id, index } => {
                let Some(entry) = entry_at(&mut entries, &id) else {
                    return FlushRequest::None;
                };
                if index >= entry.sets.len() {
                    return FlushRequest::None;
                }
                entry.sets.remove(index);
                FlushRequest::Immediate(id)
            }

            SessionAction::ToggleAllCompletion(id) => {
                let Some(entry) = entry_at(&mut entries, &id) else {
                    return FlushRequest::None;
                };
                let all_done = !entry.sets.is_empty() && entry.sets.iter().all(|s| s.completed);
                if all_done {
                    for set in &mut entry.sets {
                        set.completed = false;
                    }
                } else {
                    for set in &mut entry.sets {
                        if set.is_filled() {
                            set.completed = true;
                        }
                    }
                }
                FlushRequest::Immediate(id)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot of all entries, in insertion order.
    pub fn entries(&self) -> Vec<ExerciseEntry> {
        self.entries.lock().clone()
    }

    pub fn get(&self, id: &EntryId) -> Option<ExerciseEntry> {
        self.entries.lock().iter().find(|e| &e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// The session start: the earliest entry's creation time.
    pub fn earliest_created_at(&self) -> Option<DateTime<Utc>> {
        self.entries.lock().iter().map(|e| e.created_at).min()
    }

    /// Distinct exercise names currently in the session.
    pub fn exercise_names(&self) -> Vec<String> {
        let entries = self.entries.lock();
        let mut names: Vec<String> = Vec::new();
        for entry in entries.iter() {
            if !names.contains(&entry.exercise_name) {
                names.push(entry.exercise_name.clone());
            }
        }
        names
    }

    /// Drain all entries, returning what was removed.
    pub fn clear(&self) -> Vec<ExerciseEntry> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_at<'a>(entries: &'a mut [ExerciseEntry], id: &EntryId) -> Option<&'a mut ExerciseEntry> {
    entries.iter_mut().find(|e| &e.id == id)
}

fn set_at<'a>(
    entries: &'a mut [ExerciseEntry],
    id: &EntryId,
    index: usize,
) -> Option<&'a mut SetRecord> {
    entry_at(entries, id)?.sets.get_mut(index)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
