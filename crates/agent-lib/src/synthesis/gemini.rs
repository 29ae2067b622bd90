//! Gemini `generateContent` adapter

use super::{GenerationResult, ModelConfig, TextGenerator};
use crate::error::GenerationError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct GeminiGenerator {
    client: Client,
    config: ModelConfig,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Gemini API key not configured")?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn call(&self, prompt: &str, schema_hint: &str) -> GenerationResult<serde_json::Value> {
        let text = format!(
            "{}\n\nReturn ONLY a JSON object with this exact structure:\n{}",
            prompt, schema_hint
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": { "response_mime_type": "application/json" }
        });

        debug!(model = %self.config.model, prompt_len = text.len(), "Calling Gemini");

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::MalformedResponse {
                    message: format!("unreadable response envelope: {}", e),
                })?;

        let text = payload
            .first_text()
            .ok_or_else(|| GenerationError::MalformedResponse {
                message: "response has no candidate text".to_string(),
            })?;

        parse_json_object(text)
    }

    fn classify(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.config.timeout)
        } else {
            GenerationError::Network(err)
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str, schema_hint: &str) -> GenerationResult<serde_json::Value> {
        match tokio::time::timeout(self.config.timeout, self.call(prompt, schema_hint)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.config.timeout)),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Parse model text as a JSON object, tolerating a markdown code fence
fn parse_json_object(text: &str) -> GenerationResult<serde_json::Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: serde_json::Value =
        serde_json::from_str(unfenced.trim()).map_err(|e| GenerationError::MalformedResponse {
            message: e.to_string(),
        })?;

    if !value.is_object() {
        return Err(GenerationError::MalformedResponse {
            message: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

    fn config(endpoint: &str) -> ModelConfig {
        ModelConfig::default()
            .with_api_key(Some("test-key".to_string()))
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(5))
    }

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    #[test]
    fn test_new_requires_key() {
        assert!(GeminiGenerator::new(ModelConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "response_mime_type": "application/json" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(r#"{"issue":"High CPU","why":"load","suggestion":"scale"}"#))
            .create_async()
            .await;

        let generator = GeminiGenerator::new(config(&server.url())).unwrap();
        let value = generator.generate("analyze", "{}").await.unwrap();

        assert_eq!(value["issue"], "High CPU");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let generator = GeminiGenerator::new(config(&server.url())).unwrap();
        let err = generator.generate("p", "{}").await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited));
    }

    #[tokio::test]
    async fn test_http_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("API key not valid")
            .create_async()
            .await;

        let generator = GeminiGenerator::new(config(&server.url())).unwrap();
        match generator.generate("p", "{}").await.unwrap_err() {
            GenerationError::Http { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_text_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(envelope("the system looks fine"))
            .create_async()
            .await;

        let generator = GeminiGenerator::new(config(&server.url())).unwrap();
        let err = generator.generate("p", "{}").await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_missing_candidates_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new(config(&server.url())).unwrap();
        let err = generator.generate("p", "{}").await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_json_object_strips_fence() {
        let value = parse_json_object("```json\n{\"overview\": \"ok\"}\n```").unwrap();
        assert_eq!(value["overview"], "ok");

        assert!(parse_json_object("[1, 2]").is_err());
    }
}
