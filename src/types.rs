//! Core data model for the active workout session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Sets
// ============================================================================

/// A single set within an exercise entry.
///
/// `weight` and `reps` start empty and are filled in by the user as the
/// workout progresses. `completed` may only become `true` once both fields
/// are present; clearing it is always allowed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetRecord {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl SetRecord {
    pub fn blank() -> Self {
        Self::default()
    }

    /// Both fields present — the set is eligible for completion.
    pub fn is_filled(&self) -> bool {
        self.weight.is_some() && self.reps.is_some()
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Identifier for an exercise entry.
///
/// Entries are inserted optimistically under a process-local `Local` id and
/// re-keyed to the gateway-assigned `Remote` id once creation is
/// acknowledged. Local ids are monotonic and never reused within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Local(u64),
    Remote(String),
}

impl EntryId {
    pub fn is_local(&self) -> bool {
        matches!(self, EntryId::Local(_))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Local(n) => write!(f, "local:{n}"),
            EntryId::Remote(id) => write!(f, "{id}"),
        }
    }
}

/// Persistence state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Creation dispatched, not yet acknowledged.
    Pending,
    /// Acknowledged by the gateway under a remote id.
    Persisted,
}

/// An exercise log row within the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub id: EntryId,
    pub exercise_name: String,
    pub category: String,
    pub sets: Vec<SetRecord>,
    pub created_at: DateTime<Utc>,
    pub status: EntryStatus,
    /// Gateway columns the engine does not model (server-side session id
    /// and the like). Carried through update round-trips untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ExerciseEntry {
    /// Completed sets only, in order.
    pub fn completed_sets(&self) -> Vec<SetRecord> {
        self.sets.iter().filter(|s| s.completed).cloned().collect()
    }

    pub fn has_incomplete_sets(&self) -> bool {
        self.sets.iter().any(|s| !s.completed)
    }
}

// ============================================================================
// History
// ============================================================================

/// Historical maximum for an exercise, ordered by weight descending with
/// reps descending as tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestSet {
    pub weight: f64,
    pub reps: u32,
}

/// The most recent completed session for an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
    pub sets: Vec<SetRecord>,
    pub date: DateTime<Utc>,
}

/// Cached per-exercise history: historical best and most recent set list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub best: Option<BestSet>,
    pub last: Option<LastSession>,
}

// ============================================================================
// Templates
// ============================================================================

/// A named, reusable exercise list used to bulk-instantiate a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub exercise_name: String,
    pub category: String,
    pub blank_set_count: usize,
}

// ============================================================================
// Summary
// ============================================================================

/// Returned by a successful session finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishSummary {
    pub duration_secs: u64,
    pub exercise_count: usize,
    /// Entries whose session-best beat the pre-finish historical best.
    pub records: usize,
}

/// Format elapsed seconds as `M:SS`, or `H:MM:SS` past the first hour.
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
