//! Template expansion into a live session, and the shared optimistic
//! creation path for single exercises.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{EngineError, GatewayError, Result};
use crate::gateway::{NewEntry, PersistenceGateway, PersistedEntry};
use crate::history::{HistoryCache, PrMarkers};
use crate::store::{SessionAction, SessionStore};
use crate::sync::SyncScheduler;
use crate::types::{
    EntryId, EntryStatus, ExerciseEntry, HistorySnapshot, SetRecord, Template, TemplateExercise,
};

/// One set per slot, index-aligned against the most recent session's sets.
/// Weight and reps carry over; completion never does.
pub fn prefill(exercise: &TemplateExercise, history: &HistorySnapshot) -> Vec<SetRecord> {
    let last_sets: &[SetRecord] = history
        .last
        .as_ref()
        .map(|last| last.sets.as_slice())
        .unwrap_or(&[]);
    (0..exercise.blank_set_count)
        .map(|i| match last_sets.get(i) {
            Some(previous) => SetRecord {
                weight: previous.weight,
                reps: previous.reps,
                completed: false,
            },
            None => SetRecord::blank(),
        })
        .collect()
}

/// Expands a [`Template`] into optimistic entries and persists them.
#[derive(Clone)]
pub struct TemplateInstantiator {
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<SessionStore>,
    history: Arc<HistoryCache>,
    markers: Arc<PrMarkers>,
    scheduler: SyncScheduler,
}

impl TemplateInstantiator {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<SessionStore>,
        history: Arc<HistoryCache>,
        markers: Arc<PrMarkers>,
        scheduler: SyncScheduler,
    ) -> Self {
        Self {
            gateway,
            store,
            history,
            markers,
            scheduler,
        }
    }

    /// Instantiate every exercise of `template`.
    ///
    /// The first exercise's creation is awaited to completion before the
    /// rest are dispatched: with the session implicit server-side, the
    /// first insert is what materializes it, and racing parallel inserts
    /// against that is not safe. The remaining creations run concurrently
    /// and are all awaited before the result is reported. Failed creations
    /// roll back their own entry; successes are kept.
    pub async fn instantiate(&self, template: &Template) -> Result<Vec<EntryId>> {
        let Some((first, rest)) = template.exercises.split_first() else {
            return Ok(Vec::new());
        };

        let mut created = Vec::new();
        let mut failures: Vec<GatewayError> = Vec::new();

        match self.create_one(first).await {
            Ok(id) => created.push(id),
            Err(error) => failures.push(error),
        }

        let handles: Vec<JoinHandle<std::result::Result<EntryId, GatewayError>>> = rest
            .iter()
            .map(|exercise| {
                let this = self.clone();
                let exercise = exercise.clone();
                tokio::spawn(async move { this.create_one(&exercise).await })
            })
            .collect();
        for handle in handles {
            match handle.await {
                Ok(Ok(id)) => created.push(id),
                Ok(Err(error)) => failures.push(error),
                Err(join_error) => failures.push(GatewayError::new(join_error.to_string())),
            }
        }

        if failures.is_empty() {
            Ok(created)
        } else {
            Err(EngineError::Bulk {
                operation: "create",
                failed: failures.len(),
                total: template.exercises.len(),
                first: failures.remove(0).to_string(),
            })
        }
    }

    /// Create a single entry outside template expansion, prefilled with the
    /// most recent session's full set list (one blank set when there is
    /// none).
    pub async fn create_exercise(
        &self,
        name: &str,
        category: &str,
    ) -> std::result::Result<EntryId, GatewayError> {
        let snapshot = self.history_or_default(name).await;
        let set_count = snapshot
            .last
            .as_ref()
            .map(|last| last.sets.len())
            .unwrap_or(0)
            .max(1);
        let exercise = TemplateExercise {
            exercise_name: name.to_string(),
            category: category.to_string(),
            blank_set_count: set_count,
        };
        self.create_one(&exercise).await
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// History lookup that degrades to blank prefill: a missing snapshot
    /// should never block adding an exercise.
    async fn history_or_default(&self, name: &str) -> HistorySnapshot {
        match self.history.get(name).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(exercise = name, %error, "history fetch failed, prefilling blank");
                HistorySnapshot::default()
            }
        }
    }

    /// Optimistic insert → gateway create → ack-swap, or rollback on
    /// failure (the engine's only rollback path).
    async fn create_one(
        &self,
        exercise: &TemplateExercise,
    ) -> std::result::Result<EntryId, GatewayError> {
        let snapshot = self.history_or_default(&exercise.exercise_name).await;
        let sets = prefill(exercise, &snapshot);
        let created_at = Utc::now();
        let local_id = self.store.next_local_id();

        self.store.apply(SessionAction::AddEntry(ExerciseEntry {
            id: local_id.clone(),
            exercise_name: exercise.exercise_name.clone(),
            category: exercise.category.clone(),
            sets: sets.clone(),
            created_at,
            status: EntryStatus::Pending,
            meta: None,
        }));

        let request = NewEntry {
            exercise_name: exercise.exercise_name.clone(),
            category: exercise.category.clone(),
            sets,
            created_at,
        };
        match self.gateway.create_entry(&request).await {
            Ok(persisted) => Ok(self.acknowledge(local_id, persisted)),
            Err(error) => {
                warn!(
                    exercise = %exercise.exercise_name,
                    %error,
                    "entry creation failed, rolling back"
                );
                self.store.apply(SessionAction::RemoveEntry(local_id));
                Err(error)
            }
        }
    }

    /// Swap the pending entry to its remote identity. Local edits that
    /// landed while the creation was outstanding diverge from the acked
    /// payload; the store reports that as an immediate flush under the new
    /// id (reconcile-on-ack).
    fn acknowledge(&self, local_id: EntryId, persisted: PersistedEntry) -> EntryId {
        let remote_id = EntryId::Remote(persisted.id.clone());
        self.markers.rekey(&local_id, &remote_id);
        let flush = self.store.apply(SessionAction::ReplaceEntry {
            local: local_id,
            persisted: ExerciseEntry {
                id: remote_id.clone(),
                exercise_name: persisted.exercise_name,
                category: persisted.category,
                sets: persisted.sets,
                created_at: persisted.created_at,
                status: EntryStatus::Persisted,
                meta: persisted.meta,
            },
        });
        self.scheduler.request(flush);
        remote_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LastSession;

    fn exercise(count: usize) -> TemplateExercise {
        TemplateExercise {
            exercise_name: "Bench Press".into(),
            category: "Chest".into(),
            blank_set_count: count,
        }
    }

    fn filled(weight: f64, reps: u32) -> SetRecord {
        SetRecord {
            weight: Some(weight),
            reps: Some(reps),
            completed: true,
        }
    }

    #[test]
    fn prefill_without_history_is_blank() {
        let sets = prefill(&exercise(3), &HistorySnapshot::default());
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|s| *s == SetRecord::blank()));
    }

    #[test]
    fn prefill_copies_fields_index_aligned_without_completion() {
        let history = HistorySnapshot {
            best: None,
            last: Some(LastSession {
                sets: vec![filled(100.0, 5), filled(105.0, 3)],
                date: Utc::now(),
            }),
        };
        let sets = prefill(&exercise(3), &history);
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].weight, Some(100.0));
        assert_eq!(sets[0].reps, Some(5));
        assert!(!sets[0].completed);
        assert_eq!(sets[1].weight, Some(105.0));
        assert_eq!(sets[2], SetRecord::blank());
    }

    #[test]
    fn prefill_truncates_to_the_template_count() {
        let history = HistorySnapshot {
            best: None,
            last: Some(LastSession {
                sets: vec![filled(100.0, 5), filled(105.0, 3)],
                date: Utc::now(),
            }),
        };
        let sets = prefill(&exercise(1), &history);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].weight, Some(100.0));
    }
}
