//! WorkoutEngine — the UI-facing facade over the session subsystems.
//!
//! Composes the store, caches, scheduler, instantiator, and timer behind
//! the operation set the UI layer drives. Control flow for a mutation:
//! store reducer first (synchronous, optimistic), then the reported flush
//! is routed to the scheduler, then any derived effects (PR detection,
//! timer, lifecycle cleanup) run.

pub mod template;
pub mod timer;

pub use template::{prefill, TemplateInstantiator};
pub use timer::SessionTimer;

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::events::{EventEmitter, ListenerId, PrEvent};
use crate::gateway::{PersistenceGateway, PersistedEntry};
use crate::history::{HistoryCache, PrMarkers};
use crate::pr;
use crate::store::{FlushRequest, SessionAction, SessionStore, SetField};
use crate::sync::{SchedulerOptions, SyncScheduler};
use crate::types::{
    EntryId, EntryStatus, ExerciseEntry, FinishSummary, Template, TemplateExercise,
};

// ============================================================================
// Options
// ============================================================================

/// Configuration for `WorkoutEngine`.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Trailing-edge delay for debounced set-field flushes in milliseconds
    /// (default: 2000).
    pub debounce_ms: Option<u64>,
}

// ============================================================================
// WorkoutEngine
// ============================================================================

pub struct WorkoutEngine {
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<SessionStore>,
    history: Arc<HistoryCache>,
    markers: Arc<PrMarkers>,
    scheduler: SyncScheduler,
    instantiator: TemplateInstantiator,
    timer: SessionTimer,
    pr_events: EventEmitter<PrEvent>,
}

impl WorkoutEngine {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, options: EngineOptions) -> Self {
        let store = Arc::new(SessionStore::new());
        let history = Arc::new(HistoryCache::new(gateway.clone()));
        let markers = Arc::new(PrMarkers::new());
        let scheduler = SyncScheduler::new(
            gateway.clone(),
            store.clone(),
            SchedulerOptions {
                debounce_ms: options.debounce_ms,
            },
        );
        let instantiator = TemplateInstantiator::new(
            gateway.clone(),
            store.clone(),
            history.clone(),
            markers.clone(),
            scheduler.clone(),
        );
        Self {
            gateway,
            store,
            history,
            markers,
            scheduler,
            instantiator,
            timer: SessionTimer::new(),
            pr_events: EventEmitter::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Rebuild the session from the gateway's active entries and restart
    /// the elapsed-time ticker from the earliest one. Returns the number of
    /// entries loaded.
    pub async fn resume(&self) -> Result<usize> {
        let persisted = self.gateway.list_active_entries().await?;
        let count = persisted.len();

        self.store.clear();
        for entry in persisted {
            self.store
                .apply(SessionAction::AddEntry(entry_from_persisted(entry)));
        }

        match self.store.earliest_created_at() {
            Some(start) => self.timer.start(start),
            None => self.timer.reset(),
        }
        Ok(count)
    }

    /// Optimistically add a new exercise entry, prefilled from the most
    /// recent session of the same exercise when one exists.
    ///
    /// A failed creation removes the pending entry again and surfaces the
    /// error — the engine's only rollback path.
    pub async fn add_exercise(&self, name: &str, category: &str) -> Result<EntryId> {
        let id = self.instantiator.create_exercise(name, category).await?;
        self.ensure_timer();
        Ok(id)
    }

    /// Instantiate a saved template into the active session.
    pub async fn load_template(&self, template: &Template) -> Result<Vec<EntryId>> {
        let result = self.instantiator.instantiate(template).await;
        // Partial failures keep their successes; the timer must reflect
        // whatever actually landed.
        self.ensure_timer();
        result
    }

    /// Remove a single entry. Local removal is optimistic; a failed gateway
    /// delete is logged, not rolled back. Removing the last entry deletes
    /// the active-session resource explicitly and resets the timer.
    pub async fn remove_entry(&self, id: &EntryId) {
        let Some(entry) = self.store.get(id) else {
            return;
        };

        self.scheduler.cancel_entry(id);
        self.markers.forget_entry(id);
        self.history.invalidate(&entry.exercise_name);
        self.store.apply(SessionAction::RemoveEntry(id.clone()));

        if let EntryId::Remote(remote_id) = &entry.id {
            if let Err(error) = self.gateway.delete_entry(remote_id).await {
                warn!(entry = %id, %error, "entry delete failed");
            }
        }

        if self.store.is_empty() {
            if let Err(error) = self.gateway.delete_active_session().await {
                warn!(%error, "active-session delete failed");
            }
            self.timer.reset();
        }
    }

    /// Archive the active session.
    ///
    /// Counts PR entries against the pre-finish historical bests, prunes
    /// incomplete sets from every entry that has them (in parallel, all
    /// awaited), then finishes the session at the gateway. On success all
    /// caches and local state are cleared and a summary is returned.
    pub async fn finish(&self) -> Result<FinishSummary> {
        let entries = self.store.entries();
        if entries.is_empty() {
            return Err(EngineError::SessionEmpty);
        }

        let records = self.count_records(&entries);

        // The prune updates below carry each entry's final state; anything
        // the scheduler still holds for them is stale.
        for entry in &entries {
            self.scheduler.cancel_entry(&entry.id);
        }

        let handles: Vec<JoinHandle<std::result::Result<(), String>>> = entries
            .iter()
            .filter(|entry| entry.has_incomplete_sets())
            .filter_map(|entry| match &entry.id {
                EntryId::Remote(remote_id) => {
                    let gateway = self.gateway.clone();
                    let remote_id = remote_id.clone();
                    let completed = entry.completed_sets();
                    Some(tokio::spawn(async move {
                        gateway
                            .update_entry_sets(&remote_id, &completed)
                            .await
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    }))
                }
                EntryId::Local(_) => None,
            })
            .collect();
        await_bulk("prune", handles).await?;

        let ids: Vec<String> = entries
            .iter()
            .filter_map(|entry| match &entry.id {
                EntryId::Remote(remote_id) => Some(remote_id.clone()),
                EntryId::Local(_) => None,
            })
            .collect();
        let duration_secs = self.session_duration_secs();
        self.gateway.finish_session(&ids, duration_secs).await?;

        // Historical bests changed for every exercise the session touched.
        self.history.clear();
        self.markers.clear();
        self.store.clear();
        self.timer.reset();

        Ok(FinishSummary {
            duration_secs,
            exercise_count: entries.len(),
            records,
        })
    }

    /// Delete every entry and the active-session resource, then clear all
    /// local state. The session delete is issued even though entry deletion
    /// may already have removed the session server-side; the gateway call
    /// is idempotent.
    pub async fn discard(&self) -> Result<()> {
        let entries = self.store.entries();
        if entries.is_empty() {
            return Err(EngineError::SessionEmpty);
        }

        for entry in &entries {
            self.scheduler.cancel_entry(&entry.id);
            self.markers.forget_entry(&entry.id);
            self.history.invalidate(&entry.exercise_name);
        }
        self.store.clear();
        self.timer.reset();

        let mut handles: Vec<JoinHandle<std::result::Result<(), String>>> = entries
            .iter()
            .filter_map(|entry| match &entry.id {
                EntryId::Remote(remote_id) => {
                    let gateway = self.gateway.clone();
                    let remote_id = remote_id.clone();
                    Some(tokio::spawn(async move {
                        gateway
                            .delete_entry(&remote_id)
                            .await
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    }))
                }
                EntryId::Local(_) => None,
            })
            .collect();
        let gateway = self.gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .delete_active_session()
                .await
                .map_err(|e| e.to_string())
        }));

        await_bulk("delete", handles).await
    }

    // -----------------------------------------------------------------------
    // Set mutations
    // -----------------------------------------------------------------------

    /// Edit a set's weight or reps. Coalesced behind the debounce window.
    pub fn update_set_field(&self, id: &EntryId, index: usize, field: SetField) {
        let flush = self.store.apply(SessionAction::UpdateSetField {
            id: id.clone(),
            index,
            field,
        });
        self.scheduler.request(flush);
    }

    /// Toggle a set's completion. Completing a set with a missing weight or
    /// reps is refused as a silent no-op. A set that just completed is
    /// checked for PR status against the exercise's historical best.
    pub async fn toggle_set(&self, id: &EntryId, index: usize) {
        let flush = self.store.apply(SessionAction::ToggleCompletion {
            id: id.clone(),
            index,
        });
        if flush == FlushRequest::None {
            return;
        }
        self.scheduler.request(flush);

        let Some(entry) = self.store.get(id) else {
            return;
        };
        if entry.sets.get(index).is_some_and(|s| s.completed) {
            self.check_pr(&entry).await;
        }
    }

    /// Append a set prefilled from the previous one.
    pub fn add_set(&self, id: &EntryId) {
        let flush = self.store.apply(SessionAction::AddSet(id.clone()));
        self.scheduler.request(flush);
    }

    pub fn remove_set(&self, id: &EntryId, index: usize) {
        let flush = self.store.apply(SessionAction::RemoveSet {
            id: id.clone(),
            index,
        });
        self.scheduler.request(flush);
    }

    /// Complete every filled set of the entry, or clear all completions
    /// when every set is already completed.
    pub async fn toggle_all(&self, id: &EntryId) {
        let flush = self
            .store
            .apply(SessionAction::ToggleAllCompletion(id.clone()));
        if flush == FlushRequest::None {
            return;
        }
        self.scheduler.request(flush);

        let Some(entry) = self.store.get(id) else {
            return;
        };
        if entry.sets.iter().any(|s| s.completed) {
            self.check_pr(&entry).await;
        }
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    pub async fn templates(&self) -> Result<Vec<Template>> {
        Ok(self.gateway.list_templates().await?)
    }

    /// Save the current session's exercise list as a reusable template.
    pub async fn save_template(&self, name: &str) -> Result<Template> {
        let entries = self.store.entries();
        if entries.is_empty() {
            return Err(EngineError::SessionEmpty);
        }
        let exercises: Vec<TemplateExercise> = entries
            .iter()
            .map(|entry| TemplateExercise {
                exercise_name: entry.exercise_name.clone(),
                category: entry.category.clone(),
                blank_set_count: entry.sets.len().max(1),
            })
            .collect();
        Ok(self.gateway.create_template(name, &exercises).await?)
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        Ok(self.gateway.delete_template(id).await?)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Live ordered entry list.
    pub fn entries(&self) -> Vec<ExerciseEntry> {
        self.store.entries()
    }

    /// Elapsed whole seconds, ticking once per second while active.
    pub fn elapsed_secs(&self) -> u64 {
        self.timer.elapsed_secs()
    }

    pub fn is_active(&self) -> bool {
        !self.store.is_empty()
    }

    /// Register a listener for one-time PR celebration events.
    pub fn on_pr(&self, callback: impl Fn(&PrEvent) + Send + Sync + 'static) -> ListenerId {
        self.pr_events.on(callback)
    }

    pub fn off_pr(&self, id: ListenerId) {
        self.pr_events.off(id);
    }

    /// Stop background work: timers and scheduled writes.
    pub fn dispose(&self) {
        self.scheduler.dispose();
        self.timer.stop();
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn ensure_timer(&self) {
        if !self.timer.is_running() {
            if let Some(start) = self.store.earliest_created_at() {
                self.timer.start(start);
            }
        }
    }

    /// Wall-clock session duration, independent of tick granularity.
    fn session_duration_secs(&self) -> u64 {
        match self.store.earliest_created_at() {
            Some(start) => (Utc::now() - start).num_seconds().max(0) as u64,
            None => self.timer.elapsed_secs(),
        }
    }

    /// Evaluate the entry's session-best against the cached historical
    /// best; emit a celebration at most once per `(entry, set)`.
    async fn check_pr(&self, entry: &ExerciseEntry) {
        let Some(best_index) = pr::session_best(&entry.sets) else {
            return;
        };
        let Some((weight, reps)) = pr::set_key(&entry.sets[best_index]) else {
            return;
        };
        let snapshot = match self.history.get(&entry.exercise_name).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(exercise = %entry.exercise_name, %error, "history fetch failed, skipping PR check");
                return;
            }
        };
        // No historical best — nothing counts as a PR.
        let Some(best) = snapshot.best else {
            return;
        };
        if pr::beats_best(weight, reps, &best) && self.markers.mark_once(&entry.id, best_index) {
            self.pr_events.emit(&PrEvent {
                entry_id: entry.id.clone(),
                exercise_name: entry.exercise_name.clone(),
                set_index: best_index,
                weight,
                reps,
            });
        }
    }

    /// PR count for summary reporting, against pre-finish cached bests.
    fn count_records(&self, entries: &[ExerciseEntry]) -> usize {
        entries
            .iter()
            .filter(|entry| {
                let Some(index) = pr::session_best(&entry.sets) else {
                    return false;
                };
                let Some((weight, reps)) = pr::set_key(&entry.sets[index]) else {
                    return false;
                };
                self.history
                    .peek(&entry.exercise_name)
                    .and_then(|snapshot| snapshot.best)
                    .is_some_and(|best| pr::beats_best(weight, reps, &best))
            })
            .count()
    }
}

fn entry_from_persisted(entry: PersistedEntry) -> ExerciseEntry {
    ExerciseEntry {
        id: EntryId::Remote(entry.id),
        exercise_name: entry.exercise_name,
        category: entry.category,
        sets: entry.sets,
        created_at: entry.created_at,
        status: EntryStatus::Persisted,
        meta: entry.meta,
    }
}

/// Await every spawned gateway call; collapse failures into one bulk error.
async fn await_bulk(
    operation: &'static str,
    handles: Vec<JoinHandle<std::result::Result<(), String>>>,
) -> Result<()> {
    let total = handles.len();
    let mut failures: Vec<String> = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => failures.push(message),
            Err(join_error) => failures.push(join_error.to_string()),
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Bulk {
            operation,
            failed: failures.len(),
            total,
            first: failures.remove(0),
        })
    }
}
