// crates/core/src/status.rs
//! The composite "full status" snapshot polled from the backend.
//!
//! Produced exclusively by the status endpoint; the client treats it
//! as immutable and derives task-registry mutations from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::{PhaseKind, PhaseStatus};

/// One polled snapshot of a job's aggregate state, exactly as the
/// backend serializes it (snake_case JSON).
///
/// Optional fields default so that older backends which omit newer
/// fields still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullStatus {
    // -- Identity -------------------------------------------------------------
    pub analysis_id: String,
    pub repository_id: String,
    #[serde(default)]
    pub commit_sha: Option<String>,

    // -- Primary analysis phase ----------------------------------------------
    #[serde(default)]
    pub analysis_status: PhaseStatus,
    #[serde(default)]
    pub vci_score: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,

    // -- Embeddings phase -----------------------------------------------------
    #[serde(default)]
    pub embeddings_status: PhaseStatus,
    #[serde(default)]
    pub embeddings_progress: u8,
    #[serde(default)]
    pub embeddings_stage: Option<String>,
    #[serde(default)]
    pub embeddings_message: Option<String>,
    #[serde(default)]
    pub embeddings_error: Option<String>,
    #[serde(default)]
    pub vectors_count: Option<u64>,

    // -- Semantic-cache phase -------------------------------------------------
    #[serde(default)]
    pub semantic_cache_status: PhaseStatus,
    #[serde(default)]
    pub has_semantic_cache: bool,

    // -- AI-scan phase --------------------------------------------------------
    #[serde(default)]
    pub ai_scan_status: PhaseStatus,
    #[serde(default)]
    pub ai_scan_progress: u8,
    #[serde(default)]
    pub ai_scan_stage: Option<String>,
    #[serde(default)]
    pub ai_scan_message: Option<String>,
    #[serde(default)]
    pub ai_scan_error: Option<String>,
    #[serde(default)]
    pub has_ai_scan_cache: bool,
    #[serde(default)]
    pub ai_scan_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ai_scan_completed_at: Option<DateTime<Utc>>,

    // -- Server-computed aggregates -------------------------------------------
    #[serde(default)]
    pub overall_progress: u8,
    #[serde(default)]
    pub overall_stage: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
}

/// A uniform, borrowed view over one phase's slice of a [`FullStatus`].
///
/// The analysis and semantic-cache phases carry no dedicated progress
/// field on the wire; their progress is derived (100 when completed,
/// the server's overall progress while active, 0 otherwise).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSnapshot<'a> {
    pub kind: PhaseKind,
    pub status: PhaseStatus,
    pub progress: u8,
    pub stage: Option<&'a str>,
    pub message: Option<&'a str>,
    pub error: Option<&'a str>,
}

impl FullStatus {
    /// View one phase's fields uniformly.
    pub fn phase(&self, kind: PhaseKind) -> PhaseSnapshot<'_> {
        match kind {
            PhaseKind::Analysis => PhaseSnapshot {
                kind,
                status: self.analysis_status,
                progress: derived_progress(self.analysis_status, self.overall_progress),
                stage: self.overall_stage.as_deref(),
                message: None,
                error: None,
            },
            PhaseKind::Embeddings => PhaseSnapshot {
                kind,
                status: self.embeddings_status,
                progress: self.embeddings_progress.min(100),
                stage: self.embeddings_stage.as_deref(),
                message: self.embeddings_message.as_deref(),
                error: self.embeddings_error.as_deref(),
            },
            PhaseKind::SemanticCache => PhaseSnapshot {
                kind,
                status: self.semantic_cache_status,
                progress: derived_progress(self.semantic_cache_status, self.overall_progress),
                stage: None,
                message: None,
                error: None,
            },
            PhaseKind::AiScan => PhaseSnapshot {
                kind,
                status: self.ai_scan_status,
                progress: self.ai_scan_progress.min(100),
                stage: self.ai_scan_stage.as_deref(),
                message: self.ai_scan_message.as_deref(),
                error: self.ai_scan_error.as_deref(),
            },
        }
    }

    /// All four phase views, in pipeline order.
    pub fn phases(&self) -> impl Iterator<Item = PhaseSnapshot<'_>> {
        PhaseKind::ALL.into_iter().map(|k| self.phase(k))
    }

    /// Any phase actively making progress (running/computing).
    pub fn any_phase_active(&self) -> bool {
        self.phases().any(|p| p.status.is_active())
    }

    /// Any phase queued or actively making progress.
    pub fn any_phase_in_progress(&self) -> bool {
        self.phases().any(|p| p.status.is_in_progress())
    }
}

fn derived_progress(status: PhaseStatus, overall: u8) -> u8 {
    match status {
        PhaseStatus::Completed => 100,
        s if s.is_active() => overall.min(100),
        _ => 0,
    }
}
