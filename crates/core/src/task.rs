// crates/core/src/task.rs
//! The client-side visible-progress representation of one phase instance.

use serde::{Deserialize, Serialize};

use crate::phase::{PhaseKind, TaskStatus};

/// A unit of visible work, rendered by UI surfaces subscribed to the
/// task registry.
///
/// At most one live task per `id` exists in the registry at a time; a
/// new task with the same id supersedes the existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTask {
    /// Registry key, stable per (repository, phase). See
    /// [`PhaseKind::task_id`].
    pub id: String,

    /// Which phase produced this task.
    #[serde(rename = "type")]
    pub kind: PhaseKind,

    /// Owning repository identifier.
    pub repository_id: String,

    pub status: TaskStatus,

    /// Completion percentage, 0–100.
    pub progress: u8,

    /// Free-form machine stage name (mapped to a human label externally).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressTask {
    /// Build a task for `kind` owned by `repository_id` with the
    /// registry key derived from the pair.
    pub fn new(kind: PhaseKind, repository_id: &str, status: TaskStatus) -> Self {
        Self {
            id: kind.task_id(repository_id),
            kind,
            repository_id: repository_id.to_string(),
            status,
            progress: 0,
            stage: None,
            message: None,
        }
    }
}
