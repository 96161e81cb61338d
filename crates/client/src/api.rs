// crates/client/src/api.rs
//! Authenticated HTTP client for the analysis backend.
//!
//! Converts HTTP status codes into the typed [`ApiError`] taxonomy at
//! this boundary. A 401 anywhere flips the session-expired signal the
//! host application watches to force re-login.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use repopulse_core::status::FullStatus;

use crate::error::ApiError;

/// Transient status-fetch failures are retried this many times on top
/// of the initial attempt.
const STATUS_RETRY_LIMIT: u32 = 2;
/// Fixed backoff between status-fetch retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Request body for the streaming chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub repository_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
}

/// Response of the AI-scan trigger endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AiScanTrigger {
    pub analysis_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    session_expired_tx: watch::Sender<bool>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let (session_expired_tx, _) = watch::channel(false);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            session_expired_tx,
        }
    }

    /// Whether a bearer token is configured. Polling is a no-op
    /// without one.
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Flips to `true` once any request came back 401. The host app
    /// reacts by navigating to login.
    pub fn session_expired(&self) -> watch::Receiver<bool> {
        self.session_expired_tx.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch the composite full-status snapshot for one analysis.
    ///
    /// 401 is terminal and never retried; transport and other HTTP
    /// errors are retried up to [`STATUS_RETRY_LIMIT`] times with a
    /// fixed backoff before surfacing.
    pub async fn full_status(
        &self,
        repository_id: &str,
        analysis_id: &str,
    ) -> Result<FullStatus, ApiError> {
        let mut attempt = 0;
        loop {
            match self.fetch_full_status(repository_id, analysis_id).await {
                Ok(status) => return Ok(status),
                Err(e @ ApiError::Unauthorized) => return Err(e),
                Err(e) if attempt < STATUS_RETRY_LIMIT => {
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        error = %e,
                        "status fetch failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_full_status(
        &self,
        repository_id: &str,
        analysis_id: &str,
    ) -> Result<FullStatus, ApiError> {
        let url = self.url(&format!(
            "/api/repositories/{repository_id}/analyses/{analysis_id}/status"
        ));
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Trigger an AI scan. A 409 means one is already in flight —
    /// non-fatal, the caller resyncs status instead.
    pub async fn trigger_ai_scan(&self, repository_id: &str) -> Result<AiScanTrigger, ApiError> {
        let url = self.url(&format!("/api/repositories/{repository_id}/ai-scan"));
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Read AI-scan results. 404 means "no scan yet", not an error.
    pub async fn ai_scan_results(
        &self,
        repository_id: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.url(&format!(
            "/api/repositories/{repository_id}/ai-scan/results"
        ));
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Open the streaming chat response. The caller consumes the
    /// `text/event-stream` body chunk by chunk.
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.url("/api/chat/stream");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        self.check(resp).await
    }

    /// Map non-2xx responses into typed errors.
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status.as_u16() {
            401 => {
                // send_replace records the flag even before anyone
                // has subscribed.
                self.session_expired_tx.send_replace(true);
                Err(ApiError::Unauthorized)
            }
            404 => Err(ApiError::NotFound),
            409 => Err(ApiError::Conflict),
            code => {
                let detail = extract_detail(resp).await.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected response")
                        .to_string()
                });
                Err(ApiError::Server {
                    status: code,
                    detail,
                })
            }
        }
    }
}

/// Pull the `detail` field out of a JSON error body, if present.
async fn extract_detail(resp: reqwest::Response) -> Option<String> {
    let body: serde_json::Value = resp.json().await.ok()?;
    body.get("detail")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = ApiClient::new("http://localhost:9000/", "t");
        assert_eq!(
            api.url("/api/chat/stream"),
            "http://localhost:9000/api/chat/stream"
        );
    }

    #[test]
    fn chat_request_omits_absent_analysis_id() {
        let req = ChatRequest {
            repository_id: "repo-1".into(),
            message: "how does auth work?".into(),
            analysis_id: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("analysis_id"));
    }

    #[test]
    fn empty_token_disables_polling_precondition() {
        assert!(!ApiClient::new("http://localhost", "").has_token());
        assert!(ApiClient::new("http://localhost", "tok").has_token());
    }
}
