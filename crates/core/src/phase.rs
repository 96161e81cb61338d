// crates/core/src/phase.rs
//! Phase and status enums for the analysis pipeline.
//!
//! One analysis job is composed of four independently-tracked backend
//! phases. Each phase reports its own status on the polled snapshot;
//! the client folds them into visible progress tasks.

use serde::{Deserialize, Serialize};

/// The four backend phases that make up one analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Primary multi-stage code analysis.
    Analysis,
    /// Embeddings generation over the analyzed code.
    Embeddings,
    /// Semantic clustering cache computation.
    SemanticCache,
    /// AI deep-scan pass.
    AiScan,
}

impl PhaseKind {
    /// All phases, in pipeline order.
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Analysis,
        PhaseKind::Embeddings,
        PhaseKind::SemanticCache,
        PhaseKind::AiScan,
    ];

    /// Stable machine name, matching the wire `*_status` field prefixes.
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Analysis => "analysis",
            PhaseKind::Embeddings => "embeddings",
            PhaseKind::SemanticCache => "semantic_cache",
            PhaseKind::AiScan => "ai_scan",
        }
    }

    /// Human-readable label for synthesized task messages.
    pub fn label(self) -> &'static str {
        match self {
            PhaseKind::Analysis => "Code analysis",
            PhaseKind::Embeddings => "Embeddings generation",
            PhaseKind::SemanticCache => "Semantic cache",
            PhaseKind::AiScan => "AI scan",
        }
    }

    /// Registry key for this phase's task: stable per (repository, phase).
    pub fn task_id(self, repository_id: &str) -> String {
        format!("{repository_id}:{}", self.as_str())
    }
}

/// Wire status of a single phase as reported by the backend.
///
/// `computing` appears only on the semantic-cache phase and `skipped`
/// only on the AI-scan phase, but the enum accepts them anywhere so a
/// backend change cannot break deserialization of the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Phase not applicable / not started for this job.
    #[default]
    None,
    Pending,
    Running,
    Computing,
    Completed,
    Failed,
    /// Phase disabled by configuration (AI scan only). Terminal, but
    /// intentionally distinct from `Failed`.
    Skipped,
}

impl PhaseStatus {
    /// Actively making progress (fast poll tier).
    pub fn is_active(self) -> bool {
        matches!(self, PhaseStatus::Running | PhaseStatus::Computing)
    }

    /// Queued or actively making progress.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            PhaseStatus::Pending | PhaseStatus::Running | PhaseStatus::Computing
        )
    }

    /// No further transitions without starting a new job.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PhaseStatus::Completed | PhaseStatus::Failed | PhaseStatus::Skipped
        )
    }
}

/// Status of a visible progress task (client-side representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}
