// crates/client/src/main.rs
//! Repo Pulse CLI — watch one analysis job's progress from the
//! terminal.
//!
//! Polls the backend's full-status endpoint, reconciles each snapshot
//! into the shared task registry, and logs every task change until
//! the job completes (or the session expires).

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use repopulse_client::api::ApiClient;
use repopulse_client::poller::spawn_poller;
use repopulse_core::registry::{TaskEvent, TaskRegistry};

/// Fallback server when neither the flag nor the env var is set.
const DEFAULT_SERVER: &str = "http://127.0.0.1:47892";

#[derive(Parser, Debug)]
#[command(name = "repopulse", about = "Watch an analysis job's progress")]
struct Args {
    /// Backend base URL. Falls back to REPOPULSE_SERVER.
    #[arg(long)]
    server: Option<String>,

    /// Bearer token. Falls back to REPOPULSE_TOKEN.
    #[arg(long)]
    token: Option<String>,

    /// Repository identifier.
    #[arg(long)]
    repository: String,

    /// Analysis job identifier.
    #[arg(long)]
    analysis: String,
}

/// Flag value, then env var, then default.
fn resolve(flag: Option<String>, env_var: &str, default: &str) -> String {
    flag.or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let server = resolve(args.server, "REPOPULSE_SERVER", DEFAULT_SERVER);
    let token = resolve(args.token, "REPOPULSE_TOKEN", "");
    if token.is_empty() {
        anyhow::bail!("no token: pass --token or set REPOPULSE_TOKEN");
    }

    let api = Arc::new(ApiClient::new(server, token));
    let mut session_expired = api.session_expired();
    let registry = TaskRegistry::new();

    // Log every task change as the synchronizer applies it.
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                TaskEvent::TaskUpserted { task } => tracing::info!(
                    id = %task.id,
                    status = ?task.status,
                    progress = task.progress,
                    stage = task.stage.as_deref().unwrap_or("-"),
                    "task"
                ),
                TaskEvent::TaskRemoved { task_id } => {
                    tracing::info!(id = %task_id, "task removed")
                }
            }
        }
    });

    let handle = spawn_poller(
        api,
        Arc::clone(&registry),
        args.repository,
        Some(args.analysis),
    );
    let mut state_rx = handle.state();

    // Run until polling stops (complete/failed) or the session expires.
    while state_rx.changed().await.is_ok() {
        let state = state_rx.borrow().clone();
        if *session_expired.borrow_and_update() {
            anyhow::bail!("session expired — log in again");
        }
        if let Some(error) = &state.error {
            tracing::warn!(%error, "poll error");
        }
        if state.is_complete() {
            tracing::info!(
                progress = state.overall_progress(),
                stage = state.overall_stage().unwrap_or("-"),
                "analysis complete"
            );
            break;
        }
    }

    // Let terminal tasks fade out before exiting.
    tokio::time::sleep(repopulse_core::reconcile::COMPLETED_REMOVAL_DELAY).await;
    Ok(())
}
