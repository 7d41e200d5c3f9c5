//! Shared mock gateway and fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use liftlog::error::GatewayError;
use liftlog::gateway::{DeleteReceipt, NewEntry, PersistedEntry, PersistenceGateway};
use liftlog::types::{HistorySnapshot, SetRecord, Template, TemplateExercise};
use parking_lot::Mutex;

// ============================================================================
// MockGateway
// ============================================================================

/// In-memory `PersistenceGateway` with default echo behavior, per-call
/// closure overrides, and a call log for ordering assertions.
pub struct MockGateway {
    inner: Mutex<MockGatewayInner>,
    /// Chronological call markers: `create:<name>` at call entry,
    /// `created:<name>` at call exit, `update:<id>`, `delete:<id>`,
    /// `delete_session`, `finish:<n>` and so on.
    calls: Mutex<Vec<String>>,
    /// Every `update_entry_sets` payload, in call order.
    updates: Mutex<Vec<(String, Vec<SetRecord>)>>,
    next_id: AtomicUsize,
    create_delay_ms: AtomicU64,
    update_delay_ms: AtomicU64,
}

#[allow(clippy::type_complexity)]
struct MockGatewayInner {
    create_response:
        Option<Box<dyn Fn(&NewEntry) -> Result<PersistedEntry, GatewayError> + Send + Sync>>,
    update_response:
        Option<Box<dyn Fn(&str, &[SetRecord]) -> Result<PersistedEntry, GatewayError> + Send + Sync>>,
    delete_response: Option<Box<dyn Fn(&str) -> Result<DeleteReceipt, GatewayError> + Send + Sync>>,
    session_delete_response: Option<Box<dyn Fn() -> Result<(), GatewayError> + Send + Sync>>,
    finish_response: Option<Box<dyn Fn(&[String], u64) -> Result<(), GatewayError> + Send + Sync>>,
    history: HashMap<String, HistorySnapshot>,
    history_response:
        Option<Box<dyn Fn(&str) -> Result<HistorySnapshot, GatewayError> + Send + Sync>>,
    active_entries: Vec<PersistedEntry>,
    templates: Vec<Template>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockGatewayInner {
                create_response: None,
                update_response: None,
                delete_response: None,
                session_delete_response: None,
                finish_response: None,
                history: HashMap::new(),
                history_response: None,
                active_entries: Vec::new(),
                templates: Vec::new(),
            }),
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            create_delay_ms: AtomicU64::new(0),
            update_delay_ms: AtomicU64::new(0),
        }
    }

    // -- overrides ----------------------------------------------------------

    pub fn on_create(
        &self,
        f: impl Fn(&NewEntry) -> Result<PersistedEntry, GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().create_response = Some(Box::new(f));
    }

    pub fn on_update(
        &self,
        f: impl Fn(&str, &[SetRecord]) -> Result<PersistedEntry, GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().update_response = Some(Box::new(f));
    }

    pub fn on_delete(
        &self,
        f: impl Fn(&str) -> Result<DeleteReceipt, GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().delete_response = Some(Box::new(f));
    }

    pub fn on_session_delete(
        &self,
        f: impl Fn() -> Result<(), GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().session_delete_response = Some(Box::new(f));
    }

    pub fn on_finish(
        &self,
        f: impl Fn(&[String], u64) -> Result<(), GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().finish_response = Some(Box::new(f));
    }

    pub fn on_history(
        &self,
        f: impl Fn(&str) -> Result<HistorySnapshot, GatewayError> + Send + Sync + 'static,
    ) {
        self.inner.lock().history_response = Some(Box::new(f));
    }

    // -- fixture state ------------------------------------------------------

    pub fn set_history(&self, exercise_name: &str, snapshot: HistorySnapshot) {
        self.inner
            .lock()
            .history
            .insert(exercise_name.to_string(), snapshot);
    }

    pub fn set_active_entries(&self, entries: Vec<PersistedEntry>) {
        self.inner.lock().active_entries = entries;
    }

    pub fn set_templates(&self, templates: Vec<Template>) {
        self.inner.lock().templates = templates;
    }

    /// Make `create_entry` sleep before responding.
    pub fn set_create_delay(&self, ms: u64) {
        self.create_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Make `update_entry_sets` sleep before responding.
    pub fn set_update_delay(&self, ms: u64) {
        self.update_delay_ms.store(ms, Ordering::SeqCst);
    }

    // -- inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn updates(&self) -> Vec<(String, Vec<SetRecord>)> {
        self.updates.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn create_entry(&self, entry: &NewEntry) -> Result<PersistedEntry, GatewayError> {
        self.record(format!("create:{}", entry.exercise_name));
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
        }
        let result = {
            let inner = self.inner.lock();
            if let Some(ref f) = inner.create_response {
                f(entry)
            } else {
                Ok(PersistedEntry {
                    id: self.fresh_id("srv"),
                    exercise_name: entry.exercise_name.clone(),
                    category: entry.category.clone(),
                    sets: entry.sets.clone(),
                    created_at: entry.created_at,
                    meta: None,
                })
            }
        };
        if result.is_ok() {
            self.record(format!("created:{}", entry.exercise_name));
        }
        result
    }

    async fn update_entry_sets(
        &self,
        id: &str,
        sets: &[SetRecord],
    ) -> Result<PersistedEntry, GatewayError> {
        self.record(format!("update:{id}"));
        let delay = self.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
        }
        self.updates.lock().push((id.to_string(), sets.to_vec()));
        let inner = self.inner.lock();
        if let Some(ref f) = inner.update_response {
            f(id, sets)
        } else {
            Ok(PersistedEntry {
                id: id.to_string(),
                exercise_name: String::new(),
                category: String::new(),
                sets: sets.to_vec(),
                created_at: Utc::now(),
                meta: None,
            })
        }
    }

    async fn delete_entry(&self, id: &str) -> Result<DeleteReceipt, GatewayError> {
        self.record(format!("delete:{id}"));
        let inner = self.inner.lock();
        if let Some(ref f) = inner.delete_response {
            f(id)
        } else {
            Ok(DeleteReceipt::default())
        }
    }

    async fn list_active_entries(&self) -> Result<Vec<PersistedEntry>, GatewayError> {
        self.record("list_active");
        Ok(self.inner.lock().active_entries.clone())
    }

    async fn delete_active_session(&self) -> Result<(), GatewayError> {
        self.record("delete_session");
        let inner = self.inner.lock();
        if let Some(ref f) = inner.session_delete_response {
            f()
        } else {
            Ok(())
        }
    }

    async fn fetch_history(&self, exercise_name: &str) -> Result<HistorySnapshot, GatewayError> {
        self.record(format!("history:{exercise_name}"));
        let inner = self.inner.lock();
        if let Some(ref f) = inner.history_response {
            f(exercise_name)
        } else {
            Ok(inner
                .history
                .get(exercise_name)
                .cloned()
                .unwrap_or_default())
        }
    }

    async fn list_templates(&self) -> Result<Vec<Template>, GatewayError> {
        self.record("templates");
        Ok(self.inner.lock().templates.clone())
    }

    async fn create_template(
        &self,
        name: &str,
        exercises: &[TemplateExercise],
    ) -> Result<Template, GatewayError> {
        self.record(format!("create_template:{name}"));
        Ok(Template {
            id: self.fresh_id("tpl"),
            name: name.to_string(),
            exercises: exercises.to_vec(),
        })
    }

    async fn delete_template(&self, id: &str) -> Result<(), GatewayError> {
        self.record(format!("delete_template:{id}"));
        Ok(())
    }

    async fn finish_session(
        &self,
        entry_ids: &[String],
        duration_secs: u64,
    ) -> Result<(), GatewayError> {
        self.record(format!("finish:{}", entry_ids.len()));
        let inner = self.inner.lock();
        if let Some(ref f) = inner.finish_response {
            f(entry_ids, duration_secs)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn filled(weight: f64, reps: u32) -> SetRecord {
    SetRecord {
        weight: Some(weight),
        reps: Some(reps),
        completed: false,
    }
}

pub fn completed(weight: f64, reps: u32) -> SetRecord {
    SetRecord {
        weight: Some(weight),
        reps: Some(reps),
        completed: true,
    }
}

pub fn best_of(weight: f64, reps: u32) -> HistorySnapshot {
    HistorySnapshot {
        best: Some(liftlog::types::BestSet { weight, reps }),
        last: None,
    }
}

pub fn persisted(id: &str, exercise_name: &str, sets: Vec<SetRecord>) -> PersistedEntry {
    persisted_at(id, exercise_name, sets, Utc::now())
}

pub fn persisted_at(
    id: &str,
    exercise_name: &str,
    sets: Vec<SetRecord>,
    created_at: DateTime<Utc>,
) -> PersistedEntry {
    PersistedEntry {
        id: id.to_string(),
        exercise_name: exercise_name.to_string(),
        category: "Chest".to_string(),
        sets,
        created_at,
        meta: None,
    }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}
