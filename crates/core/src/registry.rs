// crates/core/src/registry.rs
//! Process-wide task registry — the single source of truth UI
//! surfaces render progress from.
//!
//! All mutation flows through the synchronizer driver; readers take
//! snapshots via [`TaskRegistry::list`] or subscribe to change events.
//! Terminal tasks are removed by a per-id timer that any later upsert
//! of the same id cancels, so a removal can never race ahead of a
//! legitimate status update.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::task::ProgressTask;

/// Change events broadcast to subscribed UI surfaces.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskUpserted { task: ProgressTask },
    TaskRemoved {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

/// In-memory keyed store of [`ProgressTask`] records.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, ProgressTask>>,
    /// Pending removal timers, keyed by task id. Replacing or
    /// cancelling aborts the old timer.
    removals: Mutex<HashMap<String, JoinHandle<()>>>,
    events_tx: broadcast::Sender<TaskEvent>,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
            removals: Mutex::new(HashMap::new()),
            events_tx,
        })
    }

    /// Insert or replace the task keyed by its id. Cancels any pending
    /// removal timer for that id.
    pub fn upsert(&self, task: ProgressTask) {
        self.cancel_removal(&task.id);
        match self.tasks.write() {
            Ok(mut guard) => {
                guard.insert(task.id.clone(), task.clone());
            }
            Err(e) => {
                tracing::error!("task map lock poisoned on upsert: {e}");
                return;
            }
        }
        // No subscribers is fine.
        let _ = self.events_tx.send(TaskEvent::TaskUpserted { task });
    }

    /// Remove the task with this id, cancelling its pending timer.
    pub fn remove(&self, id: &str) -> Option<ProgressTask> {
        self.cancel_removal(id);
        self.remove_inner(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.tasks.read().map(|g| g.contains_key(id)).unwrap_or(false)
    }

    pub fn get(&self, id: &str) -> Option<ProgressTask> {
        self.tasks.read().ok().and_then(|g| g.get(id).cloned())
    }

    /// Snapshot of all live tasks, ordered by id for stable rendering.
    pub fn list(&self) -> Vec<ProgressTask> {
        let mut tasks: Vec<ProgressTask> = match self.tasks.read() {
            Ok(guard) => guard.values().cloned().collect(),
            Err(e) => {
                tracing::error!("task map lock poisoned on list: {e}");
                Vec::new()
            }
        };
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// The set of currently registered ids (input to reconciliation).
    pub fn ids(&self) -> HashSet<String> {
        self.tasks
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events_tx.subscribe()
    }

    /// Arm (or re-arm) the removal timer for a terminal task. The
    /// timer is cancelled if the task is upserted or removed before it
    /// fires.
    pub fn schedule_removal(self: &Arc<Self>, id: &str, delay: Duration) {
        let registry = Arc::clone(self);
        let task_id = id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.remove_inner(&task_id);
            if let Ok(mut guard) = registry.removals.lock() {
                guard.remove(&task_id);
            }
        });
        match self.removals.lock() {
            Ok(mut guard) => {
                if let Some(old) = guard.insert(id.to_string(), handle) {
                    old.abort();
                }
            }
            Err(e) => {
                tracing::error!("removal map lock poisoned: {e}");
                handle.abort();
            }
        }
    }

    fn cancel_removal(&self, id: &str) {
        if let Ok(mut guard) = self.removals.lock() {
            if let Some(handle) = guard.remove(id) {
                handle.abort();
            }
        }
    }

    fn remove_inner(&self, id: &str) -> Option<ProgressTask> {
        let removed = match self.tasks.write() {
            Ok(mut guard) => guard.remove(id),
            Err(e) => {
                tracing::error!("task map lock poisoned on remove: {e}");
                None
            }
        };
        if removed.is_some() {
            let _ = self.events_tx.send(TaskEvent::TaskRemoved {
                task_id: id.to_string(),
            });
        }
        removed
    }
}
