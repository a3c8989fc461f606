//! HTTP client for the analysis backend.
//!
//! [`AnalysisSender`] is the seam the mediator depends on;
//! [`AnalysisClient`] is the real transport and [`GuardedSender`] wraps
//! any sender with the circuit breaker.

use std::time::Duration;

use argus_core::{AnalysisRequest, AnalysisResponse};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::breaker::Breaker;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("analysis request failed: {0}")]
    Transport(String),

    #[error("analysis API returned status {0}")]
    Status(u16),

    #[error("failed to decode analysis response: {0}")]
    Decode(String),

    #[error("analysis circuit is open")]
    CircuitOpen,
}

/// Anything that can deliver an [`AnalysisRequest`] and return a verdict.
#[async_trait]
pub trait AnalysisSender: Send + Sync {
    async fn send_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, SendError>;
}

/// Real transport: `POST {base_url}/analyze` with the project API key.
pub struct AnalysisClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl AnalysisSender for AnalysisClient {
    async fn send_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, SendError> {
        let url = format!("{}/analyze", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SendError::Status(status.as_u16()));
        }

        let verdict = response
            .json::<AnalysisResponse>()
            .await
            .map_err(|e| SendError::Decode(e.to_string()))?;

        debug!(route = %request.route, is_threat = ?verdict.is_threat, "analysis verdict received");
        Ok(verdict)
    }
}

/// Circuit-broken sender. Every failure of the inner call counts toward
/// the trip threshold; while open, calls fail fast without touching the
/// network.
pub struct GuardedSender<S> {
    inner: S,
    breaker: Breaker,
}

impl<S> GuardedSender<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            breaker: Breaker::new("analysis-backend"),
        }
    }
}

#[async_trait]
impl<S: AnalysisSender> AnalysisSender for GuardedSender<S> {
    async fn send_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, SendError> {
        let generation = self
            .breaker
            .acquire()
            .map_err(|_| SendError::CircuitOpen)?;

        match self.inner.send_analysis(request).await {
            Ok(response) => {
                self.breaker.on_success(generation);
                Ok(response)
            }
            Err(err) => {
                self.breaker.on_failure(generation);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AnalysisRequest {
        let mut headers = HashMap::new();
        headers.insert("Method".to_string(), "GET".to_string());
        let mut metadata = HashMap::new();
        metadata.insert("waf_result".to_string(), "PASS".to_string());
        AnalysisRequest {
            log: String::new(),
            ip: "198.51.100.2:9001".to_string(),
            headers,
            route: "/".to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn sends_bearer_key_and_decodes_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(header("Authorization", "Bearer argus_testkey"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "metadata": { "waf_result": "PASS" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "is_threat": false,
                "reason": "benign",
                "confidence": 0.1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            AnalysisClient::new(server.uri(), "argus_testkey", DEFAULT_TIMEOUT).unwrap();
        let verdict = client.send_analysis(&request()).await.unwrap();
        assert_eq!(verdict.is_threat, Some(false));
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AnalysisClient::new(server.uri(), "bad_key", DEFAULT_TIMEOUT).unwrap();
        let err = client.send_analysis(&request()).await.unwrap_err();
        assert!(matches!(err, SendError::Status(401)));
    }

    #[tokio::test]
    async fn malformed_response_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = AnalysisClient::new(server.uri(), "key", DEFAULT_TIMEOUT).unwrap();
        let err = client.send_analysis(&request()).await.unwrap_err();
        assert!(matches!(err, SendError::Decode(_)));
    }

    struct FailingSender {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AnalysisSender for FailingSender {
        async fn send_analysis(
            &self,
            _request: &AnalysisRequest,
        ) -> Result<AnalysisResponse, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SendError::Status(500))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_sender_stops_calling_after_trip() {
        let guarded = GuardedSender::new(FailingSender {
            calls: AtomicU32::new(0),
        });

        for _ in 0..4 {
            let err = guarded.send_analysis(&request()).await.unwrap_err();
            assert!(matches!(err, SendError::Status(500)));
        }

        // Fifth call: rejected without touching the inner sender.
        let err = guarded.send_analysis(&request()).await.unwrap_err();
        assert!(matches!(err, SendError::CircuitOpen));
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 4);

        // After the open timeout one probe goes through again.
        tokio::time::advance(std::time::Duration::from_secs(31)).await;
        let err = guarded.send_analysis(&request()).await.unwrap_err();
        assert!(matches!(err, SendError::Status(500)));
        assert_eq!(guarded.inner.calls.load(Ordering::SeqCst), 5);
    }
}
