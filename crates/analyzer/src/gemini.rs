//! Gemini adapter for the [`AiClient`] trait.
//!
//! Talks to the Gemini REST API directly with `reqwest`. The generation
//! config pins the response MIME type to JSON so the model emits the bare
//! verdict object instead of prose.

use argus_core::AiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::AiClient;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Context ceiling handed to the truncator.
const MAX_TOKENS: usize = 30_000;

/// Gemini REST API client. Cheap to share; `reqwest::Client` is an
/// internally pooled handle, so concurrent use is fine.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        body: &GenerateRequest,
    ) -> Result<T, AiError> {
        let url = format!("{}/v1beta/models/{}:{}", self.base_url, self.model, action);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AiError::Network(e.to_string()))
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let request = GenerateRequest {
            contents: vec![Content::text(prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        let response: GenerateResponse = self.post("generateContent", &request).await?;

        let text: String = response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }

        debug!(model = %self.model, output_len = text.len(), "gemini generation complete");
        Ok(text)
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, AiError> {
        let request = GenerateRequest {
            contents: vec![Content::text(text)],
            generation_config: None,
        };

        let response: CountTokensResponse = self
            .post("countTokens", &request)
            .await
            .map_err(|e| AiError::CountTokens(e.to_string()))?;

        Ok(response.total_tokens)
    }

    fn max_tokens(&self) -> usize {
        MAX_TOKENS
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    #[serde(rename = "totalTokens")]
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", "gemini-2.5-flash")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn generate_concatenates_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "{\"is_threat\":" },
                    { "text": " false}" }
                ]}}]
            })))
            .mount(&server)
            .await;

        let out = client(&server).generate("classify this").await.unwrap();
        assert_eq!(out, "{\"is_threat\": false}");
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
    }

    #[tokio::test]
    async fn vendor_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        match err {
            AiError::ApiError { status_code, .. } => assert_eq!(status_code, 429),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn count_tokens_reads_total() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:countTokens"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "totalTokens": 1234 })),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).count_tokens("abc").await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn max_tokens_is_constant() {
        let server = MockServer::start().await;
        assert_eq!(client(&server).max_tokens(), 30_000);
    }
}
