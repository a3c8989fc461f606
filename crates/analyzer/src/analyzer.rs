//! The classifier pipeline: truncate, prompt, generate, validate.

use std::sync::Arc;

use argus_core::{AnalysisRequest, AnalysisResponse, AnalyzerError};
use tracing::{error, warn};

use crate::client::AiClient;
use crate::prompt;
use crate::truncate::truncate_log;

/// Turns an [`AnalysisRequest`] into a validated verdict.
pub struct Analyzer {
    client: Arc<dyn AiClient>,
}

impl Analyzer {
    pub fn new(client: Arc<dyn AiClient>) -> Self {
        Self { client }
    }

    /// Classify one request.
    ///
    /// The captured log is truncated to the model budget first; the whole
    /// (possibly truncated) request is then JSON-encoded into the prompt.
    /// Model output must parse into the three-field schema with every field
    /// present, otherwise [`AnalyzerError::MalformedResponse`] is returned.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, AnalyzerError> {
        let mut request = request.clone();
        request.log =
            truncate_log(self.client.as_ref(), request.log, self.client.max_tokens()).await;

        let request_json = serde_json::to_string(&request)
            .map_err(|e| AnalyzerError::EncodeRequest(e.to_string()))?;

        let prompt = prompt::render(&request_json);

        let output = match self.client.generate(&prompt).await {
            Ok(output) => output,
            Err(err) => {
                error!(error = %err, route = %request.route, "AI generation failed");
                return Err(AnalyzerError::GenerateFailed);
            }
        };

        let response: AnalysisResponse = match serde_json::from_str(&output) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "AI output was not valid JSON");
                return Err(AnalyzerError::MalformedResponse);
            }
        };

        if !response.is_complete() {
            warn!(
                has_is_threat = response.is_threat.is_some(),
                has_reason = response.reason.is_some(),
                has_confidence = response.confidence.is_some(),
                "AI response missing required fields"
            );
            return Err(AnalyzerError::MalformedResponse);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockAi;
    use std::collections::HashMap;

    fn request() -> AnalysisRequest {
        let mut headers = HashMap::new();
        headers.insert("Method".to_string(), "GET".to_string());
        let mut metadata = HashMap::new();
        metadata.insert("waf_result".to_string(), "BLOCK".to_string());
        AnalysisRequest {
            log: "q=' OR 1=1 --".to_string(),
            ip: "203.0.113.9:4411".to_string(),
            headers,
            route: "/search".to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn returns_validated_verdict() {
        let ai = Arc::new(MockAi::new().generating(
            r#"{"is_threat": true, "reason": "SQL injection", "confidence": 0.95}"#,
        ));
        let analyzer = Analyzer::new(ai);

        let res = analyzer.analyze(&request()).await.unwrap();
        assert_eq!(res.is_threat, Some(true));
        assert_eq!(res.reason.as_deref(), Some("SQL injection"));
        assert_eq!(res.confidence, Some(0.95));
    }

    #[tokio::test]
    async fn generate_failure_maps_to_generate_failed() {
        let analyzer = Analyzer::new(Arc::new(MockAi::new().failing_generate()));
        let err = analyzer.analyze(&request()).await.unwrap_err();
        assert_eq!(err, AnalyzerError::GenerateFailed);
    }

    #[tokio::test]
    async fn non_json_output_is_malformed() {
        let analyzer = Analyzer::new(Arc::new(MockAi::new().generating("definitely a threat")));
        let err = analyzer.analyze(&request()).await.unwrap_err();
        assert_eq!(err, AnalyzerError::MalformedResponse);
    }

    #[tokio::test]
    async fn missing_field_is_malformed() {
        for partial in [
            r#"{"reason": "x", "confidence": 0.5}"#,
            r#"{"is_threat": false, "confidence": 0.5}"#,
            r#"{"is_threat": false, "reason": "x"}"#,
        ] {
            let analyzer = Analyzer::new(Arc::new(MockAi::new().generating(partial)));
            let err = analyzer.analyze(&request()).await.unwrap_err();
            assert_eq!(err, AnalyzerError::MalformedResponse, "payload: {partial}");
        }
    }

    #[tokio::test]
    async fn out_of_range_confidence_passes_verbatim() {
        let ai = Arc::new(
            MockAi::new().generating(r#"{"is_threat": true, "reason": "x", "confidence": 1.7}"#),
        );
        let analyzer = Analyzer::new(ai);
        let res = analyzer.analyze(&request()).await.unwrap();
        assert_eq!(res.confidence, Some(1.7));
    }

    #[tokio::test]
    async fn prompt_embeds_request_as_json() {
        let ai = Arc::new(MockAi::new().generating(
            r#"{"is_threat": false, "reason": "benign", "confidence": 0.2}"#,
        ));
        let analyzer = Analyzer::new(ai.clone());
        analyzer.analyze(&request()).await.unwrap();

        let prompts = ai.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        // The body reaches the prompt only inside a JSON string literal.
        assert!(prompts[0].contains(r#""log":"q=' OR 1=1 --""#));
        assert!(!prompts[0].contains("{{REQUEST_JSON}}"));
    }
}
