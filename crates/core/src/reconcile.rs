// crates/core/src/reconcile.rs
//! Status-to-registry synchronizer and staleness guard.
//!
//! [`reconcile`] is pure: it maps one polled snapshot onto registry
//! mutations given the previous per-session observations and the set
//! of currently registered task ids. [`apply_mutations`] is the
//! effectful driver that commits those mutations (and arms the
//! terminal fade-out timers) on a [`TaskRegistry`].
//!
//! Staleness: right after a new run is triggered the backend may
//! still report the previous run's terminal `completed` status for a
//! few cycles. Trusting it would flash progress to 100% and back. A
//! `completed` observation is therefore held back while a task is
//! still registered, the session is young (`poll_count <=`
//! [`STALE_POLL_WINDOW`]), and the phase was never seen in progress
//! this session. The hold keeps the fast poll tier engaged, and stays
//! engaged even after the backend resets the phase to `none`, for as
//! long as the held task is still registered.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::phase::{PhaseKind, PhaseStatus, TaskStatus};
use crate::poll::STALE_POLL_WINDOW;
use crate::registry::TaskRegistry;
use crate::status::{FullStatus, PhaseSnapshot};
use crate::task::ProgressTask;

/// Fade-out delay after a successful phase completion.
pub const COMPLETED_REMOVAL_DELAY: Duration = Duration::from_millis(3000);
/// Fade-out delay after a phase failure (longer, so the message is
/// actually readable).
pub const FAILED_REMOVAL_DELAY: Duration = Duration::from_millis(5000);

/// Stage name used while a stale completion is being held back.
const WAITING_STAGE: &str = "waiting";

/// Per-polling-session state threaded through successive reconciles.
///
/// Reset whenever the polling session restarts (new analysis id or
/// repository), so a fresh session starts with a clean stale window.
#[derive(Debug, Clone, Default)]
pub struct Observations {
    /// Number of polls processed this session.
    pub poll_count: u32,
    /// Phases observed `pending`/`running` at least once this session.
    seen_in_progress: [bool; 4],
    /// Phases whose task is currently parked in the waiting hold
    /// state.
    held: [bool; 4],
}

impl Observations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_in_progress(&self, kind: PhaseKind) -> bool {
        self.seen_in_progress[phase_index(kind)]
    }

    pub fn is_held(&self, kind: PhaseKind) -> bool {
        self.held[phase_index(kind)]
    }

    fn mark_in_progress(&mut self, kind: PhaseKind) {
        self.seen_in_progress[phase_index(kind)] = true;
    }

    fn set_held(&mut self, kind: PhaseKind, held: bool) {
        self.held[phase_index(kind)] = held;
    }
}

fn phase_index(kind: PhaseKind) -> usize {
    match kind {
        PhaseKind::Analysis => 0,
        PhaseKind::Embeddings => 1,
        PhaseKind::SemanticCache => 2,
        PhaseKind::AiScan => 3,
    }
}

/// One registry mutation derived from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryMutation {
    /// Create or refresh a live task from an in-progress phase.
    Upsert(ProgressTask),
    /// Mark an existing task completed and arm the 3 s fade-out.
    Complete { id: String, kind: PhaseKind },
    /// Mark an existing task failed and arm the 5 s fade-out.
    Fail {
        id: String,
        kind: PhaseKind,
        message: String,
    },
    /// Stale completion: force the existing task into a pending
    /// "waiting" holding state instead of completing it.
    Hold { id: String, kind: PhaseKind },
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub mutations: Vec<RegistryMutation>,
    pub observations: Observations,
    /// True while any phase is being held in the stale window; the
    /// poller forces the fast interval tier to shorten the window in
    /// wall-clock time.
    pub hold_active: bool,
}

/// Map one snapshot onto registry mutations.
///
/// Idempotent: re-applying the same snapshot yields mutations that
/// replace rather than duplicate state (upserts are keyed, fade-out
/// timers are re-armed not doubled).
pub fn reconcile(
    previous: &Observations,
    status: &FullStatus,
    registered_ids: &HashSet<String>,
) -> ReconcileOutcome {
    let mut observations = previous.clone();
    observations.poll_count += 1;

    let mut mutations = Vec::new();
    let mut hold_active = false;

    for snapshot in status.phases() {
        let id = snapshot.kind.task_id(&status.repository_id);
        let task_exists = registered_ids.contains(&id);
        let was_in_progress = previous.seen_in_progress(snapshot.kind);

        match snapshot.status {
            PhaseStatus::Pending | PhaseStatus::Running | PhaseStatus::Computing => {
                observations.mark_in_progress(snapshot.kind);
                observations.set_held(snapshot.kind, false);
                mutations.push(RegistryMutation::Upsert(task_from_phase(
                    &status.repository_id,
                    &snapshot,
                )));
            }
            PhaseStatus::Completed => {
                let stale = task_exists
                    && observations.poll_count <= STALE_POLL_WINDOW
                    && !was_in_progress;
                if stale {
                    hold_active = true;
                    observations.set_held(snapshot.kind, true);
                    mutations.push(RegistryMutation::Hold {
                        id,
                        kind: snapshot.kind,
                    });
                } else {
                    observations.set_held(snapshot.kind, false);
                    if task_exists {
                        mutations.push(RegistryMutation::Complete {
                            id,
                            kind: snapshot.kind,
                        });
                    }
                    // No task: the phase finished before we ever
                    // surfaced it. Nothing to show, nothing to fade
                    // out.
                }
            }
            PhaseStatus::Failed => {
                observations.set_held(snapshot.kind, false);
                if task_exists {
                    let message = snapshot
                        .error
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} failed", snapshot.kind.label()));
                    mutations.push(RegistryMutation::Fail {
                        id,
                        kind: snapshot.kind,
                        message,
                    });
                }
            }
            PhaseStatus::None => {
                // The backend reset the phase while its task is still
                // parked in the waiting state: keep the fast tier
                // until the new run actually surfaces.
                if task_exists && observations.is_held(snapshot.kind) {
                    hold_active = true;
                } else {
                    observations.set_held(snapshot.kind, false);
                }
            }
            // Skipped is terminal but deliberately invisible: the
            // phase was disabled by configuration, not broken.
            PhaseStatus::Skipped => {}
        }
    }

    ReconcileOutcome {
        mutations,
        observations,
        hold_active,
    }
}

/// Commit mutations to the registry, arming fade-out timers for
/// terminal transitions.
pub fn apply_mutations(registry: &Arc<TaskRegistry>, mutations: Vec<RegistryMutation>) {
    for mutation in mutations {
        match mutation {
            RegistryMutation::Upsert(task) => registry.upsert(task),
            RegistryMutation::Complete { id, kind } => {
                if let Some(mut task) = registry.get(&id) {
                    // Re-observing a terminal phase must not re-arm
                    // the fade-out timer: under fast polling the
                    // replacement would land before the timer ever
                    // fires.
                    if task.status == TaskStatus::Completed {
                        continue;
                    }
                    task.status = TaskStatus::Completed;
                    task.progress = 100;
                    task.message = Some(format!("{} complete", kind.label()));
                    registry.upsert(task);
                    registry.schedule_removal(&id, COMPLETED_REMOVAL_DELAY);
                }
            }
            RegistryMutation::Fail { id, message, .. } => {
                if let Some(mut task) = registry.get(&id) {
                    if task.status == TaskStatus::Failed {
                        continue;
                    }
                    task.status = TaskStatus::Failed;
                    task.message = Some(message);
                    registry.upsert(task);
                    registry.schedule_removal(&id, FAILED_REMOVAL_DELAY);
                }
            }
            RegistryMutation::Hold { id, .. } => {
                if let Some(mut task) = registry.get(&id) {
                    task.status = TaskStatus::Pending;
                    task.stage = Some(WAITING_STAGE.to_string());
                    task.message = Some("Waiting for the new run to start...".to_string());
                    registry.upsert(task);
                }
            }
        }
    }
}

fn task_from_phase(repository_id: &str, snapshot: &PhaseSnapshot<'_>) -> ProgressTask {
    let status = match snapshot.status {
        PhaseStatus::Pending => TaskStatus::Pending,
        _ => TaskStatus::Running,
    };
    ProgressTask {
        id: snapshot.kind.task_id(repository_id),
        kind: snapshot.kind,
        repository_id: repository_id.to_string(),
        status,
        progress: snapshot.progress,
        stage: snapshot.stage.map(str::to_string),
        message: snapshot.message.map(str::to_string),
    }
}
