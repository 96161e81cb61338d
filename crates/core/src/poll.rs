// crates/core/src/poll.rs
//! Adaptive re-poll interval policy.
//!
//! A pure function of the last successful snapshot, recomputed after
//! every fetch has been fully processed. The staleness guard
//! ([`crate::reconcile`]) may force the fast tier on top of this
//! policy while a hold is active.

use std::time::Duration;

use crate::status::FullStatus;
use crate::phase::PhaseStatus;

/// Fast tier: no data yet, or at least one phase actively running.
pub const FAST_POLL: Duration = Duration::from_millis(2000);
/// At least one phase queued but none running.
pub const PENDING_POLL: Duration = Duration::from_millis(3000);
/// Waiting between phases.
pub const IDLE_POLL: Duration = Duration::from_millis(5000);

/// Stale-completion window, in polls. Paired with [`FAST_POLL`]: the
/// guard tolerates roughly `STALE_POLL_WINDOW x FAST_POLL` (~10 s) of
/// pre-reset server state after a new run starts. Tune the pair
/// together, not independently; the heuristic only upper-bounds the
/// common case of backend reset latency.
pub const STALE_POLL_WINDOW: u32 = 5;

/// Outcome of the interval policy: schedule the next poll after a
/// delay, or stop polling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    After(Duration),
    /// Do not reschedule — the job is finished.
    Stop,
}

/// Compute the delay before the next poll from the last successful
/// snapshot, if any.
pub fn next_poll_interval(status: Option<&FullStatus>) -> PollInterval {
    let Some(status) = status else {
        // Fast initial probing until the first snapshot lands.
        return PollInterval::After(FAST_POLL);
    };

    if status.is_complete {
        return PollInterval::Stop;
    }

    // The job failed outright and nothing is still moving.
    if status.analysis_status == PhaseStatus::Failed && !status.any_phase_in_progress() {
        return PollInterval::Stop;
    }

    if status.any_phase_active() {
        return PollInterval::After(FAST_POLL);
    }

    if status.any_phase_in_progress() {
        return PollInterval::After(PENDING_POLL);
    }

    PollInterval::After(IDLE_POLL)
}
