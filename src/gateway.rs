//! PersistenceGateway — the durable-storage seam.
//!
//! The engine never talks to the network directly; every remote effect goes
//! through this trait. Implementations handle transport concerns (HTTP,
//! auth, payload shape) against the backing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{HistorySnapshot, SetRecord, Template, TemplateExercise};

// ============================================================================
// Request / response types
// ============================================================================

/// Payload for creating a new exercise entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub exercise_name: String,
    pub category: String,
    pub sets: Vec<SetRecord>,
    pub created_at: DateTime<Utc>,
}

/// An entry as echoed back by the gateway.
#[derive(Debug, Clone)]
pub struct PersistedEntry {
    pub id: String,
    pub exercise_name: String,
    pub category: String,
    pub sets: Vec<SetRecord>,
    pub created_at: DateTime<Utc>,
    /// Columns the engine does not model.
    pub meta: Option<Value>,
}

/// Result of deleting a single entry.
#[derive(Debug, Clone, Default)]
pub struct DeleteReceipt {
    /// Server-side session the entry belonged to, when the gateway reports
    /// one. Informational; the engine tracks session emptiness locally.
    pub session_id: Option<String>,
}

// ============================================================================
// PersistenceGateway
// ============================================================================

/// Durable CRUD for exercise entries, templates, and history queries.
///
/// The active session is implicit server-side: it materializes on the first
/// entry creation and disappears with its last entry (or an explicit
/// `delete_active_session`, which must be idempotent).
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create an entry; the returned id keys all later calls for it.
    async fn create_entry(&self, entry: &NewEntry) -> Result<PersistedEntry, GatewayError>;

    /// Replace the entry's full set list.
    async fn update_entry_sets(
        &self,
        id: &str,
        sets: &[SetRecord],
    ) -> Result<PersistedEntry, GatewayError>;

    async fn delete_entry(&self, id: &str) -> Result<DeleteReceipt, GatewayError>;

    /// All entries of the user's active session, if any.
    async fn list_active_entries(&self) -> Result<Vec<PersistedEntry>, GatewayError>;

    /// Remove the active-session resource. Safe to call when none exists.
    async fn delete_active_session(&self) -> Result<(), GatewayError>;

    /// Historical best and most recent set list for an exercise, computed
    /// over completed sessions only.
    async fn fetch_history(&self, exercise_name: &str) -> Result<HistorySnapshot, GatewayError>;

    async fn list_templates(&self) -> Result<Vec<Template>, GatewayError>;

    async fn create_template(
        &self,
        name: &str,
        exercises: &[TemplateExercise],
    ) -> Result<Template, GatewayError>;

    async fn delete_template(&self, id: &str) -> Result<(), GatewayError>;

    /// Archive the session holding the given entries.
    async fn finish_session(
        &self,
        entry_ids: &[String],
        duration_secs: u64,
    ) -> Result<(), GatewayError>;
}
