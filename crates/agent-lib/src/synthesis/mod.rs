//! Generative text capability used by the AI-assisted agents
//!
//! Callers hand a prompt plus a description of the JSON object they expect
//! and receive that object back. The only production implementation talks
//! to Gemini; when no credential is configured an [`UnavailableGenerator`]
//! stands in so callers can degrade instead of failing.

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiGenerator;

use crate::error::GenerationError;
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

pub type GenerationResult<T> = Result<T, GenerationError>;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a JSON object honoring `schema_hint`
    async fn generate(&self, prompt: &str, schema_hint: &str)
        -> GenerationResult<serde_json::Value>;

    /// False when calls are guaranteed to fail with `Unavailable`
    fn is_available(&self) -> bool;

    fn provider_name(&self) -> &'static str;
}

/// Model adapter settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Client-side bound on one HTTP exchange
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl ModelConfig {
    /// Defaults with the credential taken from `GEMINI_API_KEY`
    pub fn from_env() -> Self {
        Self::default().with_api_key(env::var(GEMINI_API_KEY_ENV).ok())
    }

    /// Set the credential; blank keys count as absent
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Copy of this config using `credential` when one is supplied
    pub fn with_override(&self, credential: Option<&str>) -> Self {
        match credential.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => self.clone().with_api_key(Some(key.to_string())),
            None => self.clone(),
        }
    }
}

/// Stand-in used when no credential is configured
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableGenerator {
    fn default() -> Self {
        Self::new("Gemini API key not configured.")
    }
}

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str, _schema_hint: &str) -> GenerationResult<serde_json::Value> {
        Err(GenerationError::Unavailable {
            message: self.reason.clone(),
        })
    }

    fn is_available(&self) -> bool {
        false
    }

    fn provider_name(&self) -> &'static str {
        "unavailable"
    }
}

/// Build the generator a config describes
pub fn generator_from_config(config: &ModelConfig) -> Arc<dyn TextGenerator> {
    if !config.has_credential() {
        return Arc::new(UnavailableGenerator::default());
    }

    match GeminiGenerator::new(config.clone()) {
        Ok(generator) => Arc::new(generator),
        Err(e) => {
            warn!(error = %e, "Failed to build Gemini client, AI features disabled");
            Arc::new(UnavailableGenerator::new(e.to_string()))
        }
    }
}

/// Generator for one request, honoring a per-request credential
///
/// A non-blank `credential` takes precedence over the configured key;
/// otherwise the shared `default` generator is reused.
pub fn with_credential_override(
    default: &Arc<dyn TextGenerator>,
    config: &ModelConfig,
    credential: Option<&str>,
) -> Arc<dyn TextGenerator> {
    match credential.map(str::trim).filter(|k| !k.is_empty()) {
        Some(_) => generator_from_config(&config.with_override(credential)),
        None => default.clone(),
    }
}

/// Run one generation under a caller-side deadline
pub async fn generate_within(
    generator: &dyn TextGenerator,
    prompt: &str,
    schema_hint: &str,
    deadline: Duration,
) -> GenerationResult<serde_json::Value> {
    match tokio::time::timeout(deadline, generator.generate(prompt, schema_hint)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(deadline)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_generator() {
        let generator = UnavailableGenerator::default();
        let err = generator.generate("prompt", "{}").await.unwrap_err();

        assert!(err.is_unavailable());
        assert!(!generator.is_available());
        assert_eq!(generator.provider_name(), "unavailable");
    }

    #[test]
    fn test_generator_from_config_without_key() {
        let generator = generator_from_config(&ModelConfig::default());
        assert!(!generator.is_available());
    }

    #[test]
    fn test_generator_from_config_with_key() {
        let config = ModelConfig::default().with_api_key(Some("k".to_string()));
        let generator = generator_from_config(&config);
        assert!(generator.is_available());
        assert_eq!(generator.provider_name(), "gemini");
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = ModelConfig::default().with_api_key(Some("  ".to_string()));
        assert!(!config.has_credential());
    }

    #[test]
    fn test_override_precedence() {
        let configured = ModelConfig::default().with_api_key(Some("configured".to_string()));

        let overridden = configured.with_override(Some("request"));
        assert_eq!(overridden.api_key.as_deref(), Some("request"));

        let kept = configured.with_override(Some(""));
        assert_eq!(kept.api_key.as_deref(), Some("configured"));

        let unset = ModelConfig::default().with_override(None);
        assert!(!unset.has_credential());
    }

    #[test]
    fn test_credential_override_builds_new_generator() {
        let default: Arc<dyn TextGenerator> = Arc::new(UnavailableGenerator::default());
        let config = ModelConfig::default();

        let reused = with_credential_override(&default, &config, None);
        assert!(!reused.is_available());

        let overridden = with_credential_override(&default, &config, Some("request-key"));
        assert!(overridden.is_available());
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str, _schema_hint: &str) -> GenerationResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(serde_json::json!({}))
        }

        fn is_available(&self) -> bool {
            true
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_generate_within_deadline() {
        let err = generate_within(&SlowGenerator, "p", "{}", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }
}
