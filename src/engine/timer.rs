//! Session elapsed-time ticker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Ticks once per second while the session is active, publishing elapsed
/// whole seconds since the session start.
///
/// The value is recomputed from the start timestamp on every tick rather
/// than accumulated, so it cannot drift under delayed ticks.
pub struct SessionTimer {
    elapsed: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            elapsed: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    /// Start ticking from `started_at`, replacing any running ticker.
    pub fn start(&self, started_at: DateTime<Utc>) {
        let elapsed = self.elapsed.clone();
        let handle = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let secs = (Utc::now() - started_at).num_seconds().max(0) as u64;
                elapsed.store(secs, Ordering::Relaxed);
            }
        });
        let mut task = self.task.lock();
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Stop ticking. The last value stays readable for summary display.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    /// Stop ticking and zero the value.
    pub fn reset(&self) {
        self.stop();
        self.elapsed.store(0, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
