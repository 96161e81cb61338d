//! Integration tests for the API client, poller, and chat driver
//! against a mock HTTP backend.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use repopulse_client::api::{ApiClient, ChatRequest};
use repopulse_client::chat::stream_chat;
use repopulse_client::poller::spawn_poller;
use repopulse_core::chat::{TranscriptAssembler, TranscriptEntry, STREAM_FAILURE_MESSAGE};
use repopulse_core::phase::TaskStatus;
use repopulse_core::registry::TaskRegistry;

const STATUS_PATH: &str = "/api/repositories/repo-1/analyses/an-1/status";

fn running_snapshot() -> String {
    serde_json::json!({
        "analysis_id": "an-1",
        "repository_id": "repo-1",
        "analysis_status": "completed",
        "embeddings_status": "running",
        "embeddings_progress": 50,
        "embeddings_stage": "chunking",
        "overall_progress": 65,
        "overall_stage": "Generating embeddings",
        "is_complete": false,
    })
    .to_string()
}

fn pending_snapshot() -> String {
    serde_json::json!({
        "analysis_id": "an-1",
        "repository_id": "repo-1",
        "analysis_status": "completed",
        "embeddings_status": "pending",
        "overall_progress": 40,
        "overall_stage": "Waiting for embeddings",
        "is_complete": false,
    })
    .to_string()
}

fn complete_snapshot() -> String {
    serde_json::json!({
        "analysis_id": "an-1",
        "repository_id": "repo-1",
        "analysis_status": "completed",
        "embeddings_status": "completed",
        "semantic_cache_status": "completed",
        "ai_scan_status": "none",
        "overall_progress": 100,
        "overall_stage": "Complete",
        "is_complete": true,
    })
    .to_string()
}

#[tokio::test]
async fn full_status_parses_wire_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(running_snapshot())
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "token-1");
    let status = api.full_status("repo-1", "an-1").await.unwrap();

    assert_eq!(status.overall_progress, 65);
    assert_eq!(status.embeddings_progress, 50);
    assert!(!status.is_complete);
    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_is_terminal_and_raises_the_session_signal() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(401)
        .expect(1) // never retried
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "stale-token");
    let mut expired = api.session_expired();
    assert!(!*expired.borrow_and_update());

    let err = api.full_status("repo-1", "an-1").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(*expired.borrow_and_update());
    mock.assert_async().await;
}

#[tokio::test]
async fn transient_server_errors_retry_twice_then_surface_detail() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"index rebuild in progress"}"#)
        .expect(3) // initial attempt + 2 retries
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "token-1");
    let err = api.full_status("repo-1", "an-1").await.unwrap_err();

    assert!(err.to_string().contains("index rebuild in progress"));
    mock.assert_async().await;
}

#[tokio::test]
async fn conflict_on_trigger_resyncs_instead_of_erroring() {
    let mut server = mockito::Server::new_async().await;
    let trigger = server
        .mock("POST", "/api/repositories/repo-1/ai-scan")
        .with_status(409)
        .create_async()
        .await;
    let status = server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(running_snapshot())
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "token-1");

    // 409 means a scan is already in flight: non-fatal, resync status.
    let err = api.trigger_ai_scan("repo-1").await.unwrap_err();
    assert!(err.is_conflict());

    let snapshot = api.full_status("repo-1", "an-1").await.unwrap();
    assert!(!snapshot.is_complete);

    trigger.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn missing_scan_results_are_an_empty_state_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/repositories/repo-1/ai-scan/results")
        .with_status(404)
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "token-1");
    let err = api.ai_scan_results("repo-1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn poller_reconciles_running_phase_into_the_registry() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(running_snapshot())
        .create_async()
        .await;

    let api = Arc::new(ApiClient::new(server.url(), "token-1"));
    let registry = TaskRegistry::new();
    let handle = spawn_poller(
        api,
        Arc::clone(&registry),
        "repo-1".into(),
        Some("an-1".into()),
    );

    let mut state_rx = handle.state();
    // Initial loading state, then the first snapshot.
    while state_rx.changed().await.is_ok() {
        if state_rx.borrow().data.is_some() {
            break;
        }
    }

    let task = registry.get("repo-1:embeddings").expect("task registered");
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.progress, 50);
    assert_eq!(task.stage.as_deref(), Some("chunking"));
    assert_eq!(state_rx.borrow().overall_progress(), 65);

    handle.stop();
}

#[tokio::test]
async fn poller_stops_when_the_job_is_complete() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(complete_snapshot())
        .expect(1) // stop means stop: no second poll
        .create_async()
        .await;

    let api = Arc::new(ApiClient::new(server.url(), "token-1"));
    let registry = TaskRegistry::new();
    let handle = spawn_poller(
        api,
        Arc::clone(&registry),
        "repo-1".into(),
        Some("an-1".into()),
    );

    let mut state_rx = handle.state();
    let mut saw_complete = false;
    // The poll loop exits after publishing the final state, closing
    // the channel.
    while state_rx.changed().await.is_ok() {
        if state_rx.borrow().is_complete() {
            saw_complete = true;
        }
    }
    assert!(saw_complete);
    assert!(registry.list().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn refetch_fetches_immediately_without_waiting_for_the_interval() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(pending_snapshot())
        .expect(2) // initial fetch plus the forced one
        .create_async()
        .await;

    let api = Arc::new(ApiClient::new(server.url(), "token-1"));
    let registry = TaskRegistry::new();
    let handle = spawn_poller(
        api,
        Arc::clone(&registry),
        "repo-1".into(),
        Some("an-1".into()),
    );

    let mut state_rx = handle.state();
    while state_rx.changed().await.is_ok() {
        if state_rx.borrow().data.is_some() {
            break;
        }
    }

    // The pending tier schedules the next poll 3000 ms out; the
    // forced fetch publishes long before that.
    handle.refetch().await;
    state_rx.changed().await.unwrap();
    assert!(state_rx.borrow().data.is_some());

    // No extra fetch piggybacks on the command.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.stop();
    mock.assert_async().await;
}

#[tokio::test]
async fn invalidate_clears_the_snapshot_and_refetches_immediately() {
    use std::io::Write;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", STATUS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|writer| {
            // Slow responses keep the cleared loading state
            // observable before the forced refetch lands.
            std::thread::sleep(std::time::Duration::from_millis(300));
            writer.write_all(running_snapshot().as_bytes())
        })
        .expect(2)
        .create_async()
        .await;

    let api = Arc::new(ApiClient::new(server.url(), "token-1"));
    let registry = TaskRegistry::new();
    let handle = spawn_poller(
        api,
        Arc::clone(&registry),
        "repo-1".into(),
        Some("an-1".into()),
    );

    let mut state_rx = handle.state();
    while state_rx.changed().await.is_ok() {
        if state_rx.borrow().data.is_some() {
            break;
        }
    }

    handle.invalidate().await;

    // First publish after the command: cached snapshot dropped,
    // loading again.
    state_rx.changed().await.unwrap();
    {
        let state = state_rx.borrow();
        assert!(state.data.is_none());
        assert!(state.is_loading);
    }

    // Second publish: the forced refetch resolved.
    state_rx.changed().await.unwrap();
    let state = state_rx.borrow().clone();
    assert!(state.data.is_some());
    assert!(!state.is_loading);
    assert_eq!(state.overall_progress(), 65);

    handle.stop();
    mock.assert_async().await;
}

#[tokio::test]
async fn disabled_poller_issues_no_network_calls() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let registry = TaskRegistry::new();

    // No token.
    let api = Arc::new(ApiClient::new(server.url(), ""));
    let _h1 = spawn_poller(api, Arc::clone(&registry), "repo-1".into(), Some("an-1".into()));

    // No analysis id.
    let api = Arc::new(ApiClient::new(server.url(), "token-1"));
    let _h2 = spawn_poller(api.clone(), Arc::clone(&registry), "repo-1".into(), None);
    let _h3 = spawn_poller(api, Arc::clone(&registry), "repo-1".into(), Some(String::new()));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_stream_assembles_a_transcript() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        ": connected\n\n",
        "event: context_source\ndata: {\"source\":\"architecture\",\"status\":\"loaded\",\"count\":4}\n\n",
        "event: step\ndata: {\"title\":\"Answering\"}\n\n",
        "event: token\ndata: {\"delta\":\"Hel\"}\n\n",
        "event: token\ndata: {\"delta\":\"lo\"}\n\n",
        "event: done\ndata: {}\n\n",
    );
    server
        .mock("POST", "/api/chat/stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let api = ApiClient::new(server.url(), "token-1");
    let request = ChatRequest {
        repository_id: "repo-1".into(),
        message: "explain the auth flow".into(),
        analysis_id: Some("an-1".into()),
    };

    let mut assembler = TranscriptAssembler::new();
    stream_chat(&api, &request, &mut assembler).await;

    let entries = assembler.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries[2],
        TranscriptEntry::Assistant {
            content: "Hello".into()
        }
    );
    assert_eq!(assembler.pending_text(), "");
}

#[tokio::test]
async fn chat_transport_failure_yields_the_generic_failure_entry() {
    // Nothing is listening here; the connect fails.
    let api = ApiClient::new("http://127.0.0.1:1", "token-1");
    let request = ChatRequest {
        repository_id: "repo-1".into(),
        message: "hello?".into(),
        analysis_id: None,
    };

    let mut assembler = TranscriptAssembler::new();
    stream_chat(&api, &request, &mut assembler).await;

    assert_eq!(
        assembler.entries(),
        &[TranscriptEntry::Failure {
            content: STREAM_FAILURE_MESSAGE.into()
        }]
    );
}
