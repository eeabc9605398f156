//! Downstream artifact handoff.
//!
//! The concrete transport is pluggable: the worker only knows that an
//! absolute path goes in and an accepted/rejected verdict comes out.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::IngestResult;

/// Receives finished artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Offer one absolute local path downstream. `Ok(false)` means the
    /// downstream explicitly rejected the artifact.
    async fn accept(&self, path: &Path) -> IngestResult<bool>;
}

/// POSTs the artifact path as JSON to a configured endpoint; any 2xx is an
/// acceptance, anything else a rejection.
pub struct HttpArtifactSink {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpArtifactSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ArtifactSink for HttpArtifactSink {
    async fn accept(&self, path: &Path) -> IngestResult<bool> {
        let body = serde_json::json!({ "path": path.display().to_string() });
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::IngestError::Handoff(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

/// Accepts everything and logs it. Default when no downstream is configured.
pub struct LogArtifactSink;

#[async_trait]
impl ArtifactSink for LogArtifactSink {
    async fn accept(&self, path: &Path) -> IngestResult<bool> {
        info!(path = %path.display(), "artifact ready");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn http_sink_reports_acceptance_and_rejection() {
        let mut server = mockito::Server::new_async().await;
        let accepted = server
            .mock("POST", "/artifacts")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"path":"/replays/match.dem"}"#.to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let sink = HttpArtifactSink::new(format!("{}/artifacts", server.url()));
        let verdict = sink.accept(&PathBuf::from("/replays/match.dem")).await.unwrap();
        assert!(verdict);
        accepted.assert_async().await;

        server.reset_async().await;
        let _rejected = server
            .mock("POST", "/artifacts")
            .with_status(409)
            .create_async()
            .await;
        let verdict = sink.accept(&PathBuf::from("/replays/match.dem")).await.unwrap();
        assert!(!verdict);
    }

    #[tokio::test]
    async fn log_sink_always_accepts() {
        assert!(LogArtifactSink
            .accept(&PathBuf::from("/tmp/x.dem"))
            .await
            .unwrap());
    }
}
