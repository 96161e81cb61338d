// crates/client/src/poller.rs
//! Status poller driver.
//!
//! One spawned task per polling session. Fetches are strictly
//! sequential: the next poll is scheduled only after the previous
//! result has been fully reconciled into the registry, so a single
//! job never has overlapping fetches. Session state (poll count,
//! in-progress observations) lives on the task's stack and dies with
//! it, so a restarted session always starts clean.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use repopulse_core::poll::{next_poll_interval, PollInterval, FAST_POLL};
use repopulse_core::reconcile::{apply_mutations, reconcile, Observations};
use repopulse_core::registry::TaskRegistry;
use repopulse_core::status::FullStatus;

use crate::api::ApiClient;
use crate::error::ApiError;

/// Reactive snapshot of the poller, published through a watch channel.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Last successful snapshot; stays at the last-known-good value
    /// across failed polls.
    pub data: Option<FullStatus>,
    /// True until the first fetch resolves, and again after an
    /// invalidation until the forced refetch resolves.
    pub is_loading: bool,
    /// Most recent fetch error, cleared by the next success.
    pub error: Option<String>,
}

impl PollState {
    pub fn overall_progress(&self) -> u8 {
        self.data.as_ref().map(|d| d.overall_progress).unwrap_or(0)
    }

    pub fn overall_stage(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.overall_stage.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.is_complete)
    }
}

#[derive(Debug, Clone, Copy)]
enum PollerCommand {
    Refetch,
    Invalidate,
}

/// Handle to a running poller. Dropping it cancels the session,
/// clearing every pending interval with it.
pub struct PollerHandle {
    state_rx: watch::Receiver<PollState>,
    cmd_tx: mpsc::Sender<PollerCommand>,
    cancel: CancellationToken,
}

impl PollerHandle {
    /// Subscribe to poll-state updates.
    pub fn state(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    /// Trigger one fetch now without altering the interval policy.
    pub async fn refetch(&self) {
        let _ = self.cmd_tx.send(PollerCommand::Refetch).await;
    }

    /// Drop the cached snapshot and force an immediate refetch.
    pub async fn invalidate(&self) {
        let _ = self.cmd_tx.send(PollerCommand::Invalidate).await;
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn a polling session for one `(repository, analysis)` pair.
///
/// Hard precondition, not an error: an empty analysis id or a missing
/// token disables the poller entirely — no task, no network call.
pub fn spawn_poller(
    api: Arc<ApiClient>,
    registry: Arc<TaskRegistry>,
    repository_id: String,
    analysis_id: Option<String>,
) -> PollerHandle {
    let (state_tx, state_rx) = watch::channel(PollState::default());
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let enabled = analysis_id.as_deref().is_some_and(|id| !id.is_empty()) && api.has_token();
    if let Some(analysis_id) = analysis_id.filter(|_| enabled) {
        tokio::spawn(poll_loop(
            api,
            registry,
            repository_id,
            analysis_id,
            state_tx,
            cmd_rx,
            cancel.clone(),
        ));
    } else {
        debug!(%repository_id, "poller disabled: no analysis id or token");
    }

    PollerHandle {
        state_rx,
        cmd_tx,
        cancel,
    }
}

async fn poll_loop(
    api: Arc<ApiClient>,
    registry: Arc<TaskRegistry>,
    repository_id: String,
    analysis_id: String,
    state_tx: watch::Sender<PollState>,
    mut cmd_rx: mpsc::Receiver<PollerCommand>,
    cancel: CancellationToken,
) {
    let mut observations = Observations::new();
    let mut state = PollState {
        is_loading: true,
        ..PollState::default()
    };
    let _ = state_tx.send(state.clone());

    info!(%repository_id, %analysis_id, "polling session started");

    loop {
        let mut hold_active = false;

        match api.full_status(&repository_id, &analysis_id).await {
            Ok(snapshot) => {
                let outcome = reconcile(&observations, &snapshot, &registry.ids());
                observations = outcome.observations;
                hold_active = outcome.hold_active;
                apply_mutations(&registry, outcome.mutations);

                state.data = Some(snapshot);
                state.is_loading = false;
                state.error = None;
            }
            Err(ApiError::Unauthorized) => {
                // Session-terminating; the ApiClient already raised
                // the session-expired signal.
                warn!(%repository_id, %analysis_id, "polling stopped: session expired");
                state.is_loading = false;
                state.error = Some(ApiError::Unauthorized.to_string());
                let _ = state_tx.send(state);
                return;
            }
            Err(e) => {
                // Leave last-known-good data displayed; keep polling.
                warn!(%repository_id, %analysis_id, error = %e, "status poll failed");
                state.is_loading = false;
                state.error = Some(e.to_string());
            }
        }
        let _ = state_tx.send(state.clone());

        // While a stale completion is being held, keep the fast tier
        // regardless of the phase's own status — it shortens the
        // stale window in wall-clock time.
        let delay = if hold_active {
            FAST_POLL
        } else {
            match next_poll_interval(state.data.as_ref()) {
                PollInterval::After(delay) => delay,
                PollInterval::Stop => {
                    info!(%repository_id, %analysis_id, "polling complete");
                    return;
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%repository_id, %analysis_id, "polling session cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(PollerCommand::Refetch) => {}
                Some(PollerCommand::Invalidate) => {
                    state.data = None;
                    state.is_loading = true;
                    let _ = state_tx.send(state.clone());
                }
                // Handle dropped: the session is over.
                None => return,
            },
        }
    }
}
