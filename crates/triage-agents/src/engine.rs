use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use triage_core::ReasoningConfig;

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("reasoning engine returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text-generation backend consulted by the classifier, resolver and responders.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Returns the raw model text. With `json_mode` the engine is asked for a JSON object.
    async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String, ReasoningError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub api_base: String,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl From<&ReasoningConfig> for OllamaConfig {
    fn from(config: &ReasoningConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            request_timeout_ms: config.request_timeout_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEngine {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaEngine {
    pub fn new(config: OllamaConfig) -> Result<Self, ReasoningError> {
        if config.model.trim().is_empty() {
            return Err(ReasoningError::InvalidResponse(
                "model name cannot be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;
        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/api/generate") {
            return base.to_string();
        }
        format!("{base}/api/generate")
    }
}

#[async_trait]
impl ReasoningEngine for OllamaEngine {
    async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String, ReasoningError> {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        if json_mode {
            body["format"] = json!("json");
        }

        tracing::debug!(model = %self.config.model, json_mode, "reasoning engine request");
        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(ReasoningError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: OllamaGenerateResponse = serde_json::from_str(&raw)?;
        if let Some(error) = parsed.error.filter(|error| !error.trim().is_empty()) {
            return Err(ReasoningError::InvalidResponse(error));
        }
        parsed
            .response
            .ok_or_else(|| ReasoningError::InvalidResponse("response field missing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn engine(server: &MockServer) -> OllamaEngine {
        OllamaEngine::new(OllamaConfig {
            api_base: server.base_url(),
            model: "mistral".to_string(),
            request_timeout_ms: 5_000,
        })
        .expect("engine")
    }

    #[tokio::test]
    async fn functional_generate_posts_expected_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate").json_body_includes(
                json!({
                    "model": "mistral",
                    "prompt": "classify this",
                    "stream": false,
                    "format": "json"
                })
                .to_string(),
            );
            then.status(200)
                .json_body(json!({"model": "mistral", "response": "{\"category\":\"resolution\"}", "done": true}));
        });

        let text = engine(&server)
            .generate("classify this", true)
            .await
            .expect("generate");
        mock.assert();
        assert_eq!(text, "{\"category\":\"resolution\"}");
    }

    #[tokio::test]
    async fn functional_non_success_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500).body("model not loaded");
        });

        let error = engine(&server)
            .generate("hello", false)
            .await
            .expect_err("status error");
        match error {
            ReasoningError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("model not loaded"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn functional_unreachable_engine_is_http_error() {
        let engine = OllamaEngine::new(OllamaConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            model: "mistral".to_string(),
            request_timeout_ms: 500,
        })
        .expect("engine");
        let error = engine.generate("hello", false).await.expect_err("unreachable");
        assert!(matches!(error, ReasoningError::Http(_)));
    }
}
